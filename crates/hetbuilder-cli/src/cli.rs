use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "hetbuilder - Builds two-dimensional heterostructure interfaces from coincidence lattices.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search coincidence lattices at one tolerance and write every accepted interface.
    Build(BuildArgs),
    /// Sweep increasing tolerances and write the single best interface.
    Match(MatchArgs),
}

/// Inputs and parameters shared by `build` and `match`.
#[derive(Args, Debug, Clone)]
pub struct InterfaceArgs {
    // --- Core Arguments ---
    /// Extended XYZ file of the bottom (lower) layer.
    #[arg(required = true, value_name = "LOWER")]
    pub lower: PathBuf,

    /// Extended XYZ file of the top (upper) layer.
    #[arg(required = true, value_name = "UPPER")]
    pub upper: PathBuf,

    /// Directory the interface files are written to.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Search Overrides ---
    /// Largest absolute integer coefficient of a superlattice vector.
    #[arg(short = 'N', long = "nmax", value_name = "INT")]
    pub n_max: Option<i64>,

    /// Smallest coefficient bound of a superlattice vector.
    #[arg(long = "nmin", value_name = "INT")]
    pub n_min: Option<i64>,

    /// Restrict coefficients to [nmin, nmax] instead of [-nmax, nmax].
    #[arg(long)]
    pub bounded_coefficients: bool,

    /// Explicit rotation angles in degrees. Takes precedence over the sweep.
    #[arg(short, long, value_name = "DEG", num_args(1..))]
    pub angles: Option<Vec<f64>>,

    /// Lower and upper limit of the angle sweep in degrees (both included).
    #[arg(long, value_name = "DEG", num_args(2))]
    pub angle_limits: Option<Vec<f64>>,

    /// Step of the angle sweep in degrees.
    #[arg(long, value_name = "DEG")]
    pub angle_stepsize: Option<f64>,

    /// Fixed angular tolerance in degrees instead of one derived from the length tolerance.
    #[arg(long, value_name = "DEG")]
    pub angular_tolerance: Option<f64>,

    /// Upper bound on the superlattice area in square Angstrom.
    #[arg(long, value_name = "FLOAT")]
    pub max_area: Option<f64>,

    /// Stop each search after this many candidate pairs.
    #[arg(long, value_name = "INT")]
    pub max_candidates: Option<u64>,

    /// Stop each search after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub time_limit: Option<f64>,

    // --- Stacking Overrides ---
    /// Cell interpolation weight: 0 keeps the lower cell, 1 the upper one.
    #[arg(short, long, value_name = "FLOAT")]
    pub weight: Option<f64>,

    /// Interlayer distance in Angstrom.
    #[arg(short, long, value_name = "FLOAT")]
    pub distance: Option<f64>,

    /// Vacuum thickness in Angstrom.
    #[arg(long, value_name = "FLOAT")]
    pub vacuum: Option<f64>,

    /// Place the lowest atom at z = 0 instead of centering the bilayer.
    #[arg(long)]
    pub bottom_anchored: bool,

    // --- Symmetry Overrides ---
    /// Symmetry precision in Angstrom.
    #[arg(long, value_name = "FLOAT")]
    pub symprec: Option<f64>,

    /// Symmetry angle tolerance in degrees.
    #[arg(long, value_name = "DEG")]
    pub symmetry_angle_tolerance: Option<f64>,

    /// Keep the interpolated interface cell instead of symmetrizing its metric.
    #[arg(long)]
    pub no_idealize: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S search.nmax=8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub common: InterfaceArgs,

    /// Length tolerance in Angstrom.
    #[arg(short, long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    /// Write only the first INT interfaces (lowest strain first).
    #[arg(short = 'n', long, value_name = "INT")]
    pub max_interfaces: Option<usize>,
}

/// Arguments for the `match` subcommand.
#[derive(Args, Debug, Clone)]
pub struct MatchArgs {
    #[command(flatten)]
    pub common: InterfaceArgs,

    /// Tolerance increment of the sweep in Angstrom.
    #[arg(long, value_name = "FLOAT")]
    pub tolerance_step: Option<f64>,

    /// Largest tolerance tried by the sweep in Angstrom.
    #[arg(long, value_name = "FLOAT")]
    pub max_tolerance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_parses_positional_layers_and_overrides() {
        let cli = Cli::parse_from([
            "hetbuilder",
            "build",
            "graphene.xyz",
            "mos2.xyz",
            "-N",
            "8",
            "--angles",
            "0",
            "30",
            "-t",
            "0.05",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Build(args) = cli.command else {
            panic!("expected the build subcommand");
        };
        assert_eq!(args.common.lower, PathBuf::from("graphene.xyz"));
        assert_eq!(args.common.upper, PathBuf::from("mos2.xyz"));
        assert_eq!(args.common.n_max, Some(8));
        assert_eq!(args.common.angles, Some(vec![0.0, 30.0]));
        assert_eq!(args.tolerance, Some(0.05));
    }

    #[test]
    fn match_command_parses_sweep_options() {
        let cli = Cli::parse_from([
            "hetbuilder",
            "match",
            "a.xyz",
            "b.xyz",
            "--angle-limits",
            "0",
            "60",
            "--tolerance-step",
            "0.02",
            "-S",
            "stacking.vacuum=20",
        ]);
        let Commands::Match(args) = cli.command else {
            panic!("expected the match subcommand");
        };
        assert_eq!(args.common.angle_limits, Some(vec![0.0, 60.0]));
        assert_eq!(args.tolerance_step, Some(0.02));
        assert_eq!(args.common.set_values, vec!["stacking.vacuum=20"]);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["hetbuilder", "-q", "-v", "build", "a.xyz", "b.xyz"]);
        assert!(result.is_err());
    }
}
