use crate::core::io::traits::StructureFile;
use crate::core::models::structure::{Structure, StructureError};
use nalgebra::{Matrix3, Point3};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const DEFAULT_PROPERTIES: &str = "species:S:1:pos:R:3";
const MAX_PREALLOCATED_ATOMS: usize = 1 << 16;

/// Comment-line key/value pairs other than `Lattice`, `Properties` and `pbc`,
/// in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XyzMetadata {
    pub fields: BTreeMap<String, String>,
}

impl XyzMetadata {
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),
}

#[derive(Debug, Error, PartialEq)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidAtomCount(String),
    #[error("Invalid float '{0}'")]
    InvalidFloat(String),
    #[error("Lattice must contain 9 numbers, found {0}")]
    InvalidLattice(usize),
    #[error("Unterminated quoted value for key '{0}'")]
    UnterminatedQuote(String),
    #[error("Unsupported Properties specification '{0}'")]
    UnsupportedProperties(String),
    #[error("Atom line has {found} columns, expected at least {expected}")]
    TooFewColumns { expected: usize, found: usize },
    #[error("Invalid pbc specification '{0}'")]
    InvalidPbc(String),
}

/// Splits an extended XYZ comment line into key/value pairs. Values may be
/// double-quoted; bare keys are stored with the value `"T"`.
fn parse_comment(line: &str, line_num: usize) -> Result<Vec<(String, String)>, XyzError> {
    let mut pairs = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }
        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=') {
            key.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            pairs.push((key, "T".to_string()));
            continue;
        }
        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(c) => value.push(c),
                    None => {
                        return Err(XyzError::Parse {
                            line: line_num,
                            kind: XyzParseErrorKind::UnterminatedQuote(key),
                        });
                    }
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                value.push(c);
            }
        }
        pairs.push((key, value));
    }
    Ok(pairs)
}

fn parse_float(value: &str, line: usize) -> Result<f64, XyzError> {
    value.parse().map_err(|_| XyzError::Parse {
        line,
        kind: XyzParseErrorKind::InvalidFloat(value.to_string()),
    })
}

/// Column offsets of the species and position entries described by a
/// `Properties` value, plus the minimum number of columns per atom line.
fn property_columns(spec: &str, line: usize) -> Result<(usize, usize, usize), XyzError> {
    let unsupported = || XyzError::Parse {
        line,
        kind: XyzParseErrorKind::UnsupportedProperties(spec.to_string()),
    };
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() % 3 != 0 {
        return Err(unsupported());
    }
    let (mut species, mut pos, mut column) = (None, None, 0usize);
    for chunk in parts.chunks(3) {
        let count: usize = chunk[2].parse().map_err(|_| unsupported())?;
        match (chunk[0], chunk[1], count) {
            ("species", "S", 1) => species = Some(column),
            ("pos", "R", 3) => pos = Some(column),
            _ => {}
        }
        column += count;
    }
    match (species, pos) {
        (Some(s), Some(p)) => Ok((s, p, column)),
        _ => Err(unsupported()),
    }
}

fn parse_pbc(value: &str, line: usize) -> Result<[bool; 3], XyzError> {
    let flags: Vec<bool> = value
        .split_whitespace()
        .map(|f| match f {
            "T" | "True" | "true" | "1" => Ok(true),
            "F" | "False" | "false" | "0" => Ok(false),
            _ => Err(()),
        })
        .collect::<Result<_, _>>()
        .map_err(|_| XyzError::Parse {
            line,
            kind: XyzParseErrorKind::InvalidPbc(value.to_string()),
        })?;
    flags.try_into().map_err(|_| XyzError::Parse {
        line,
        kind: XyzParseErrorKind::InvalidPbc(value.to_string()),
    })
}

fn format_value(value: &str) -> String {
    if value.is_empty() || value.contains(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// Extended XYZ: atom count, a key/value comment line carrying `Lattice`,
/// `Properties` and `pbc`, then one line per atom.
///
/// A file without `Lattice` yields an all-zero cell with no periodic axes.
pub struct XyzFile;

impl StructureFile for XyzFile {
    type Metadata = XyzMetadata;
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Structure, Self::Metadata), Self::Error> {
        let mut lines = reader.lines();

        let count_line = lines
            .next()
            .ok_or_else(|| XyzError::MissingRecord("atom count".into()))??;
        let count: usize = count_line.trim().parse().map_err(|_| XyzError::Parse {
            line: 1,
            kind: XyzParseErrorKind::InvalidAtomCount(count_line.trim().to_string()),
        })?;

        let comment = lines
            .next()
            .ok_or_else(|| XyzError::MissingRecord("comment line".into()))??;

        let mut cell = Matrix3::zeros();
        let mut pbc = None;
        let mut properties = DEFAULT_PROPERTIES.to_string();
        let mut has_lattice = false;
        let mut metadata = XyzMetadata::default();
        for (key, value) in parse_comment(&comment, 2)? {
            match key.as_str() {
                "Lattice" | "lattice" => {
                    let numbers: Vec<f64> = value
                        .split_whitespace()
                        .map(|v| parse_float(v, 2))
                        .collect::<Result<_, _>>()?;
                    if numbers.len() != 9 {
                        return Err(XyzError::Parse {
                            line: 2,
                            kind: XyzParseErrorKind::InvalidLattice(numbers.len()),
                        });
                    }
                    cell = Matrix3::from_row_slice(&numbers);
                    has_lattice = true;
                }
                "Properties" | "properties" => properties = value,
                "pbc" => pbc = Some(parse_pbc(&value, 2)?),
                _ => {
                    metadata.fields.insert(key, value);
                }
            }
        }
        let pbc = pbc.unwrap_or([has_lattice; 3]);
        let (species_col, pos_col, min_columns) = property_columns(&properties, 2)?;

        // The header count is untrusted until the records are read.
        let reserved = count.min(MAX_PREALLOCATED_ATOMS);
        let mut species = Vec::with_capacity(reserved);
        let mut positions = Vec::with_capacity(reserved);
        for index in 0..count {
            let line_num = index + 3;
            let line = lines
                .next()
                .ok_or_else(|| XyzError::MissingRecord(format!("atom {}", index + 1)))??;
            let columns: Vec<&str> = line.split_whitespace().collect();
            if columns.len() < min_columns {
                return Err(XyzError::Parse {
                    line: line_num,
                    kind: XyzParseErrorKind::TooFewColumns {
                        expected: min_columns,
                        found: columns.len(),
                    },
                });
            }
            species.push(columns[species_col].to_string());
            positions.push(Point3::new(
                parse_float(columns[pos_col], line_num)?,
                parse_float(columns[pos_col + 1], line_num)?,
                parse_float(columns[pos_col + 2], line_num)?,
            ));
        }

        let structure = Structure::new(cell, species, positions, pbc)?;
        Ok((structure, metadata))
    }

    fn write_to(
        structure: &Structure,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        writeln!(writer, "{}", structure.len())?;

        let cell = structure.cell();
        let lattice: Vec<String> = (0..3)
            .flat_map(|i| (0..3).map(move |j| (i, j)))
            .map(|(i, j)| format!("{:.8}", cell[(i, j)]))
            .collect();
        let pbc: Vec<&str> = structure
            .pbc()
            .iter()
            .map(|&p| if p { "T" } else { "F" })
            .collect();
        write!(
            writer,
            "Lattice=\"{}\" Properties={} pbc=\"{}\"",
            lattice.join(" "),
            DEFAULT_PROPERTIES,
            pbc.join(" ")
        )?;
        for (key, value) in &metadata.fields {
            write!(writer, " {}={}", key, format_value(value))?;
        }
        writeln!(writer)?;

        for (symbol, p) in structure.species().iter().zip(structure.positions()) {
            writeln!(writer, "{:<2} {:>16.8} {:>16.8} {:>16.8}", symbol, p.x, p.y, p.z)?;
        }
        Ok(())
    }

    fn write_structure_to(
        structure: &Structure,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        Self::write_to(structure, &XyzMetadata::default(), writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GRAPHENE: &str = "2
Lattice=\"2.46 0.0 0.0 -1.23 2.130422 0.0 0.0 0.0 20.0\" Properties=species:S:1:pos:R:3 pbc=\"T T F\" source=test
C 0.0 0.0 10.0
C 1.23 0.710141 10.0
";

    fn read(content: &str) -> Result<(Structure, XyzMetadata), XyzError> {
        XyzFile::read_from(&mut Cursor::new(content))
    }

    #[test]
    fn read_from_parses_extended_xyz() {
        let (structure, metadata) = read(GRAPHENE).unwrap();
        assert_eq!(structure.len(), 2);
        assert_eq!(structure.pbc(), [true, true, false]);
        assert!((structure.cell()[(1, 0)] + 1.23).abs() < 1e-12);
        assert!((structure.positions()[1].y - 0.710141).abs() < 1e-12);
        assert_eq!(metadata.get("source"), Some("test"));
    }

    #[test]
    fn read_from_without_lattice_yields_zero_cell() {
        let (structure, _) = read("1\nplain comment\nC 0 0 0\n").unwrap();
        assert_eq!(structure.zero_vectors(), vec![0, 1, 2]);
        assert_eq!(structure.pbc(), [false; 3]);
    }

    #[test]
    fn read_from_respects_property_column_order() {
        let content = "1\nLattice=\"1 0 0 0 1 0 0 0 1\" Properties=id:I:1:species:S:1:pos:R:3\n7 Mo 0.1 0.2 0.3\n";
        let (structure, _) = read(content).unwrap();
        assert_eq!(structure.species()[0], "Mo");
        assert!((structure.positions()[0].z - 0.3).abs() < 1e-12);
    }

    #[test]
    fn read_from_reports_line_of_bad_float() {
        let content = "1\nLattice=\"1 0 0 0 1 0 0 0 1\"\nC 0.0 abc 0.0\n";
        match read(content) {
            Err(XyzError::Parse { line, kind }) => {
                assert_eq!(line, 3);
                assert_eq!(kind, XyzParseErrorKind::InvalidFloat("abc".into()));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn read_from_rejects_truncated_files() {
        assert!(matches!(
            read("3\nLattice=\"1 0 0 0 1 0 0 0 1\"\nC 0 0 0\n"),
            Err(XyzError::MissingRecord(_))
        ));
    }

    #[test]
    fn read_from_rejects_huge_atom_count_without_allocating_it() {
        assert!(matches!(
            read("99999999999\nLattice=\"1 0 0 0 1 0 0 0 1\"\nC 0 0 0\n"),
            Err(XyzError::MissingRecord(_))
        ));
    }

    #[test]
    fn read_from_rejects_unterminated_quotes() {
        assert!(matches!(
            read("1\nLattice=\"1 0 0\nC 0 0 0\n"),
            Err(XyzError::Parse {
                kind: XyzParseErrorKind::UnterminatedQuote(_),
                ..
            })
        ));
    }

    #[test]
    fn read_from_rejects_unknown_elements() {
        assert!(matches!(
            read("1\nLattice=\"1 0 0 0 1 0 0 0 1\"\nXx 0 0 0\n"),
            Err(XyzError::Structure(StructureError::UnknownElement(_)))
        ));
    }

    #[test]
    fn write_to_path_then_read_preserves_structure_and_fields() {
        let (structure, _) = read(GRAPHENE).unwrap();
        let metadata = XyzMetadata::default()
            .with_field("angle", 21.79)
            .with_field("M", "1 2 -2 1");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graphene.xyz");
        XyzFile::write_to_path(&structure, &metadata, &path).unwrap();

        let (read_back, read_metadata) = XyzFile::read_from_path(&path).unwrap();
        assert_eq!(read_back.species(), structure.species());
        for (a, b) in read_back.positions().iter().zip(structure.positions()) {
            assert!((a - b).norm() < 1e-7);
        }
        assert_eq!(read_back.pbc(), structure.pbc());
        assert_eq!(read_metadata.get("angle"), Some("21.79"));
        assert_eq!(read_metadata.get("M"), Some("1 2 -2 1"));
    }
}
