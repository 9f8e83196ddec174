pub mod build;
pub mod matching;

use crate::error::{CliError, Result};
use hetbuilder::core::io::traits::StructureFile;
use hetbuilder::core::io::xyz::XyzFile;
use hetbuilder::core::models::structure::Structure;
use hetbuilder::engine::state::Interface;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

fn read_layer(path: &Path) -> Result<Structure> {
    info!("Loading layer from {:?}", path);
    let (structure, _) = XyzFile::read_from_path(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    Ok(structure)
}

/// Picks a file name under `dir` that this run has not used yet; a repeated
/// name gets a numeric suffix.
fn unique_output_path(dir: &Path, name: &str, used: &mut HashSet<String>) -> PathBuf {
    let mut candidate = name.to_string();
    let stem = name.strip_suffix(".xyz").unwrap_or(name);
    let mut index = 1;
    while !used.insert(candidate.clone()) {
        index += 1;
        candidate = format!("{}_{}.xyz", stem, index);
    }
    dir.join(candidate)
}

fn write_interface(interface: &Interface, path: &Path) -> Result<()> {
    info!(
        "Writing interface (angle {:.2}, stress {:.4}) to {:?}",
        interface.angle, interface.stress, path
    );
    XyzFile::write_to_path(&interface.structure, &interface.metadata(), path).map_err(|e| {
        CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_output_path_suffixes_repeated_names() {
        let dir = Path::new("out");
        let mut used = HashSet::new();
        let first = unique_output_path(dir, "C4_angle0.00_stress0.00.xyz", &mut used);
        let second = unique_output_path(dir, "C4_angle0.00_stress0.00.xyz", &mut used);
        let third = unique_output_path(dir, "C4_angle0.00_stress0.00.xyz", &mut used);
        assert_eq!(first, dir.join("C4_angle0.00_stress0.00.xyz"));
        assert_eq!(second, dir.join("C4_angle0.00_stress0.00_2.xyz"));
        assert_eq!(third, dir.join("C4_angle0.00_stress0.00_3.xyz"));
    }

    #[test]
    fn read_layer_reports_path_of_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xyz");
        std::fs::write(&path, "not a number\n").unwrap();
        assert!(matches!(
            read_layer(&path),
            Err(CliError::FileParsing { path: p, .. }) if p == path
        ));
    }
}
