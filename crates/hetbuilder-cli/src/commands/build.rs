use super::{read_layer, unique_output_path, write_interface};
use crate::cli::BuildArgs;
use crate::config::build_build_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use hetbuilder::core::symmetry::MoyoSymmetry;
use hetbuilder::engine::progress::ProgressReporter;
use hetbuilder::workflows;
use std::collections::HashSet;
use tracing::{info, warn};

pub fn run(args: BuildArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_build_config(&args)?;
    let config = &app.core_config;

    let bottom = read_layer(&app.lower_path)?;
    let top = read_layer(&app.upper_path)?;

    let provider = MoyoSymmetry::new(Some(config.symmetry.angle_tolerance));
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Searching coincidence lattices for {} on {}...",
        top.chemical_formula(),
        bottom.chemical_formula()
    );
    let result = workflows::build::run(&bottom, &top, config, &provider, &reporter)?;

    if result.truncated {
        warn!("Search budget exhausted; results cover only part of the search space.");
        println!("Warning: the search budget ran out; results may be incomplete.");
    }
    if result.is_empty() {
        warn!("No coincidence lattices found.");
        println!(
            "No coincidence lattices found at tolerance {} A. Try a larger tolerance or Nmax.",
            config.search.tolerance
        );
        return Ok(());
    }

    std::fs::create_dir_all(&app.output_dir)?;
    println!(
        "Found {} solution(s). Writing {} interface(s) to {}",
        result.solutions.len(),
        result.interfaces.len(),
        app.output_dir.display()
    );
    println!(
        "{:>4}  {:>10}  {:>10}  {:>10}  {:>6}  file",
        "#", "angle", "stress %", "area A^2", "atoms"
    );

    let mut used = HashSet::new();
    for (i, (interface, solution)) in result
        .interfaces
        .iter()
        .zip(&result.solutions)
        .enumerate()
    {
        let path = unique_output_path(&app.output_dir, &interface.default_file_name(), &mut used);
        write_interface(interface, &path)?;
        println!(
            "{:>4}  {:>10.4}  {:>10.4}  {:>10.2}  {:>6}  {}",
            i + 1,
            interface.angle,
            interface.stress,
            solution.area,
            interface.structure.len(),
            path.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::path::Path;

    fn write_graphene(path: &Path) {
        let a = 2.46;
        let h = 0.5 * 3f64.sqrt() * a;
        let content = format!(
            "2\nLattice=\"{a} 0.0 0.0 {} {h} 0.0 0.0 0.0 20.0\" Properties=species:S:1:pos:R:3 pbc=\"T T T\"\n\
             C {} {} 10.0\nC {} {} 10.0\n",
            0.5 * a,
            0.5 * a,
            h / 3.0,
            a,
            2.0 * h / 3.0,
        );
        std::fs::write(path, content).unwrap();
    }

    fn parse_build(args: &[&str]) -> BuildArgs {
        let Commands::Build(build) = Cli::parse_from(args).command else {
            panic!("expected the build subcommand");
        };
        build
    }

    #[test]
    fn run_writes_interfaces_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layer = dir.path().join("graphene.xyz");
        write_graphene(&layer);
        let out = dir.path().join("interfaces");

        let args = parse_build(&[
            "hetbuilder",
            "build",
            layer.to_str().unwrap(),
            layer.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "-N",
            "1",
            "--angles",
            "0",
            "-t",
            "0.1",
        ]);
        run(args).unwrap();

        let written: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert!(!written.is_empty());
        assert!(
            written
                .iter()
                .all(|p| p.extension().is_some_and(|ext| ext == "xyz"))
        );
    }

    #[test]
    fn run_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.xyz");
        let args = parse_build(&[
            "hetbuilder",
            "build",
            missing.to_str().unwrap(),
            missing.to_str().unwrap(),
        ]);
        assert!(run(args).is_err());
    }
}
