use super::defaults::DefaultsConfig;
use super::file::{
    FileConfig, FileSearchConfig, FileStackingConfig, FileSweepConfig, FileSymmetryConfig,
};
use super::models::AppConfig;
use crate::cli::{BuildArgs, InterfaceArgs, MatchArgs};
use crate::error::{CliError, Result};
use hetbuilder::core::cell::normalize::Normalization;
use hetbuilder::engine::config as core_config;
use std::str::FromStr;
use std::time::Duration;

pub fn build_build_config(args: &BuildArgs) -> Result<AppConfig<core_config::BuildConfig>> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_file_config(&args.common)?;

    let search = merge_search(
        &args.common,
        file_config.search.take().unwrap_or_default(),
        args.tolerance,
        &defaults,
    )?;
    let stacking = merge_stacking(
        &args.common,
        file_config.stacking.take().unwrap_or_default(),
        &defaults,
    );
    let symmetry = merge_symmetry(
        &args.common,
        file_config.symmetry.take().unwrap_or_default(),
        &defaults,
    );
    let max_interfaces = args.max_interfaces.or(file_config
        .build
        .take()
        .and_then(|build| build.max_interfaces));

    let mut builder = core_config::BuildConfigBuilder::new()
        .search(search)
        .stacking(stacking)
        .symmetry(symmetry);
    if let Some(n) = max_interfaces {
        builder = builder.max_interfaces(n);
    }
    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(app_config(&args.common, core_config))
}

pub fn build_match_config(args: &MatchArgs) -> Result<AppConfig<core_config::MatchConfig>> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_file_config(&args.common)?;

    let sweep = merge_sweep(args, file_config.sweep.take().unwrap_or_default(), &defaults);
    // The sweep overrides the tolerance level by level; the first level seeds
    // the search so that it validates.
    let search = merge_search(
        &args.common,
        file_config.search.take().unwrap_or_default(),
        Some(sweep.step),
        &defaults,
    )?;
    let stacking = merge_stacking(
        &args.common,
        file_config.stacking.take().unwrap_or_default(),
        &defaults,
    );
    let symmetry = merge_symmetry(
        &args.common,
        file_config.symmetry.take().unwrap_or_default(),
        &defaults,
    );

    let core_config = core_config::MatchConfigBuilder::new()
        .search(search)
        .stacking(stacking)
        .symmetry(symmetry)
        .sweep(sweep)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(app_config(&args.common, core_config))
}

fn app_config<C>(common: &InterfaceArgs, core_config: C) -> AppConfig<C> {
    AppConfig {
        lower_path: common.lower.clone(),
        upper_path: common.upper.clone(),
        output_dir: common.output_dir.clone(),
        core_config,
    }
}

fn load_file_config(common: &InterfaceArgs) -> Result<FileConfig> {
    let file_config = match &common.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    apply_set_values(file_config, &common.set_values)
}

fn merge_search(
    args: &InterfaceArgs,
    file: FileSearchConfig,
    tolerance: Option<f64>,
    defaults: &DefaultsConfig,
) -> Result<core_config::SearchConfig> {
    let angles = resolve_angles(args, &file, defaults);

    let coefficient_range = if args.bounded_coefficients {
        core_config::CoefficientRange::Bounded
    } else {
        file.coefficient_range.map(Into::into).unwrap_or_default()
    };

    let angular_tolerance = match args.angular_tolerance.or(file.angular_tolerance) {
        Some(degrees) => core_config::AngularTolerance::Fixed { degrees },
        None => core_config::AngularTolerance::Derived,
    };

    let time_limit = args
        .time_limit
        .or(file.time_limit)
        .map(|secs| {
            Duration::try_from_secs_f64(secs).map_err(|_| {
                CliError::Config(format!(
                    "Time limit must be a non-negative number of seconds, got {}",
                    secs
                ))
            })
        })
        .transpose()?;
    let budget = core_config::SearchBudget {
        max_candidates: args.max_candidates.or(file.max_candidates),
        time_limit,
    };

    let mut builder = core_config::SearchConfigBuilder::new()
        .n_max(args.n_max.or(file.n_max).unwrap_or(defaults.n_max))
        .n_min(args.n_min.or(file.n_min).unwrap_or(defaults.n_min))
        .coefficient_range(coefficient_range)
        .angles(angles)
        .tolerance(tolerance.or(file.tolerance).unwrap_or(defaults.tolerance))
        .angular_tolerance(angular_tolerance)
        .budget(budget);
    if let Some(area) = args.max_area.or(file.max_area) {
        builder = builder.max_area(area);
    }
    builder.build().map_err(|e| CliError::Config(e.to_string()))
}

/// Command-line angles beat a command-line sweep, which beats the file's
/// angles, which beat the file's sweep.
fn resolve_angles(
    args: &InterfaceArgs,
    file: &FileSearchConfig,
    defaults: &DefaultsConfig,
) -> core_config::AngleSelection {
    if let Some(angles) = &args.angles {
        return core_config::AngleSelection::Explicit(angles.clone());
    }
    let cli_limits = args.angle_limits.as_deref().and_then(|l| match l {
        [start, stop] => Some([*start, *stop]),
        _ => None,
    });
    let cli_sweep = cli_limits.is_some() || args.angle_stepsize.is_some();
    if !cli_sweep {
        if let Some(angles) = &file.angles {
            return core_config::AngleSelection::Explicit(angles.clone());
        }
    }

    let [start, stop] = cli_limits
        .or(file.angle_limits)
        .unwrap_or(defaults.angle_limits);
    let step = args
        .angle_stepsize
        .or(file.angle_stepsize)
        .unwrap_or(defaults.angle_stepsize);
    core_config::AngleSelection::Sweep { start, stop, step }
}

fn merge_stacking(
    args: &InterfaceArgs,
    file: FileStackingConfig,
    defaults: &DefaultsConfig,
) -> core_config::StackingConfig {
    let normalization = if args.bottom_anchored {
        Normalization::BottomAnchored
    } else {
        file.normalization.unwrap_or_default()
    };
    core_config::StackingConfig {
        weight: args.weight.or(file.weight).unwrap_or(defaults.weight),
        distance: args.distance.or(file.distance).unwrap_or(defaults.distance),
        vacuum: args.vacuum.or(file.vacuum).unwrap_or(defaults.vacuum),
        normalization,
    }
}

fn merge_symmetry(
    args: &InterfaceArgs,
    file: FileSymmetryConfig,
    defaults: &DefaultsConfig,
) -> core_config::SymmetryConfig {
    let idealize = if args.no_idealize {
        false
    } else {
        file.idealize.unwrap_or(defaults.idealize)
    };
    core_config::SymmetryConfig {
        symprec: args.symprec.or(file.symprec).unwrap_or(defaults.symprec),
        angle_tolerance: args
            .symmetry_angle_tolerance
            .or(file.angle_tolerance)
            .unwrap_or(defaults.symmetry_angle_tolerance),
        idealize,
    }
}

fn merge_sweep(
    args: &MatchArgs,
    file: FileSweepConfig,
    defaults: &DefaultsConfig,
) -> core_config::SweepConfig {
    core_config::SweepConfig {
        step: args
            .tolerance_step
            .or(file.step)
            .unwrap_or(defaults.tolerance_step),
        max_tolerance: args
            .max_tolerance
            .or(file.max_tolerance)
            .unwrap_or(defaults.max_tolerance),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();
        let value = value.trim();

        let (section, field) = key.split_once('.').unwrap_or(("", key));
        match section {
            "search" => {
                let search = config.search.get_or_insert_with(Default::default);
                match field {
                    "nmax" => search.n_max = Some(parse_value(key, value)?),
                    "nmin" => search.n_min = Some(parse_value(key, value)?),
                    "angle-stepsize" => search.angle_stepsize = Some(parse_value(key, value)?),
                    "tolerance" => search.tolerance = Some(parse_value(key, value)?),
                    "angular-tolerance" => {
                        search.angular_tolerance = Some(parse_value(key, value)?)
                    }
                    "max-area" => search.max_area = Some(parse_value(key, value)?),
                    "max-candidates" => search.max_candidates = Some(parse_value(key, value)?),
                    "time-limit" => search.time_limit = Some(parse_value(key, value)?),
                    _ => return Err(unsupported_key(key)),
                }
            }
            "stacking" => {
                let stacking = config.stacking.get_or_insert_with(Default::default);
                match field {
                    "weight" => stacking.weight = Some(parse_value(key, value)?),
                    "distance" => stacking.distance = Some(parse_value(key, value)?),
                    "vacuum" => stacking.vacuum = Some(parse_value(key, value)?),
                    "normalization" => {
                        stacking.normalization = Some(match value {
                            "centered" => Normalization::Centered,
                            "bottom-anchored" => Normalization::BottomAnchored,
                            _ => {
                                return Err(CliError::Config(format!(
                                    "Invalid value for {}: {}. Expected 'centered' or 'bottom-anchored'.",
                                    key, value
                                )));
                            }
                        })
                    }
                    _ => return Err(unsupported_key(key)),
                }
            }
            "symmetry" => {
                let symmetry = config.symmetry.get_or_insert_with(Default::default);
                match field {
                    "symprec" => symmetry.symprec = Some(parse_value(key, value)?),
                    "angle-tolerance" => symmetry.angle_tolerance = Some(parse_value(key, value)?),
                    "idealize" => symmetry.idealize = Some(parse_value(key, value)?),
                    _ => return Err(unsupported_key(key)),
                }
            }
            "sweep" => {
                let sweep = config.sweep.get_or_insert_with(Default::default);
                match field {
                    "step" => sweep.step = Some(parse_value(key, value)?),
                    "max-tolerance" => sweep.max_tolerance = Some(parse_value(key, value)?),
                    _ => return Err(unsupported_key(key)),
                }
            }
            "build" if field == "max-interfaces" => {
                config
                    .build
                    .get_or_insert_with(Default::default)
                    .max_interfaces = Some(parse_value(key, value)?);
            }
            _ => return Err(unsupported_key(key)),
        }
    }
    Ok(config)
}

fn unsupported_key(key: &str) -> CliError {
    CliError::Config(format!("Unsupported configuration key for --set: '{}'", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn base_interface_args() -> InterfaceArgs {
        InterfaceArgs {
            lower: PathBuf::from("graphene.xyz"),
            upper: PathBuf::from("mos2.xyz"),
            output_dir: PathBuf::from("out"),
            config: None,
            n_max: None,
            n_min: None,
            bounded_coefficients: false,
            angles: None,
            angle_limits: None,
            angle_stepsize: None,
            angular_tolerance: None,
            max_area: None,
            max_candidates: None,
            time_limit: None,
            weight: None,
            distance: None,
            vacuum: None,
            bottom_anchored: false,
            symprec: None,
            symmetry_angle_tolerance: None,
            no_idealize: false,
            set_values: vec![],
        }
    }

    fn base_build_args() -> BuildArgs {
        BuildArgs {
            common: base_interface_args(),
            tolerance: None,
            max_interfaces: None,
        }
    }

    fn base_match_args() -> MatchArgs {
        MatchArgs {
            common: base_interface_args(),
            tolerance_step: None,
            max_tolerance: None,
        }
    }

    #[test]
    fn build_config_uses_defaults_when_nothing_is_given() {
        let app = build_build_config(&base_build_args()).unwrap();
        let defaults = DefaultsConfig::default();
        let cfg = app.core_config;

        assert_eq!(app.lower_path, PathBuf::from("graphene.xyz"));
        assert_eq!(app.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.search.n_max, defaults.n_max);
        assert_eq!(cfg.search.n_min, defaults.n_min);
        assert_eq!(cfg.search.tolerance, defaults.tolerance);
        assert_eq!(
            cfg.search.angles,
            core_config::AngleSelection::Sweep {
                start: 0.0,
                stop: 90.0,
                step: 1.0
            }
        );
        assert_eq!(
            cfg.search.coefficient_range,
            core_config::CoefficientRange::Symmetric
        );
        assert_eq!(
            cfg.search.angular_tolerance,
            core_config::AngularTolerance::Derived
        );
        assert_eq!(cfg.search.budget, core_config::SearchBudget::default());
        assert_eq!(cfg.stacking.distance, defaults.distance);
        assert_eq!(cfg.stacking.vacuum, defaults.vacuum);
        assert_eq!(cfg.stacking.normalization, Normalization::Centered);
        assert!(cfg.symmetry.idealize);
        assert_eq!(cfg.max_interfaces, None);
    }

    #[test]
    fn build_config_prefers_cli_over_set_over_file() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("hetbuilder.toml");
        fs::write(
            &cfg_path,
            r#"
            [search]
            nmax = 6
            tolerance = 0.3
            angles = [0.0, 15.0]

            [stacking]
            distance = 3.0
            vacuum = 10.0
            normalization = "bottom-anchored"

            [build]
            max-interfaces = 2
            "#,
        )
        .unwrap();

        let mut args = base_build_args();
        args.common.config = Some(cfg_path);
        args.common.n_max = Some(4);
        args.common.set_values = vec!["stacking.distance=3.4".into(), "search.nmax=9".into()];
        args.tolerance = Some(0.05);

        let cfg = build_build_config(&args).unwrap().core_config;
        assert_eq!(cfg.search.n_max, 4);
        assert_eq!(cfg.search.tolerance, 0.05);
        assert_eq!(
            cfg.search.angles,
            core_config::AngleSelection::Explicit(vec![0.0, 15.0])
        );
        assert_eq!(cfg.stacking.distance, 3.4);
        assert_eq!(cfg.stacking.vacuum, 10.0);
        assert_eq!(cfg.stacking.normalization, Normalization::BottomAnchored);
        assert_eq!(cfg.max_interfaces, Some(2));
    }

    #[test]
    fn cli_angle_sweep_overrides_file_angles() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("hetbuilder.toml");
        fs::write(&cfg_path, "[search]\nangles = [10.0]\nangle-stepsize = 2.0\n").unwrap();

        let mut args = base_build_args();
        args.common.config = Some(cfg_path);
        args.common.angle_limits = Some(vec![0.0, 30.0]);

        let cfg = build_build_config(&args).unwrap().core_config;
        assert_eq!(
            cfg.search.angles,
            core_config::AngleSelection::Sweep {
                start: 0.0,
                stop: 30.0,
                step: 2.0
            }
        );
    }

    #[test]
    fn cli_flags_select_budget_and_tolerance_modes() {
        let mut args = base_build_args();
        args.common.bounded_coefficients = true;
        args.common.n_min = Some(1);
        args.common.angular_tolerance = Some(0.5);
        args.common.max_candidates = Some(500);
        args.common.time_limit = Some(2.5);
        args.common.bottom_anchored = true;
        args.common.no_idealize = true;
        args.common.max_area = Some(80.0);

        let cfg = build_build_config(&args).unwrap().core_config;
        assert_eq!(
            cfg.search.coefficient_range,
            core_config::CoefficientRange::Bounded
        );
        assert_eq!(
            cfg.search.angular_tolerance,
            core_config::AngularTolerance::Fixed { degrees: 0.5 }
        );
        assert_eq!(cfg.search.budget.max_candidates, Some(500));
        assert_eq!(
            cfg.search.budget.time_limit,
            Some(Duration::from_millis(2500))
        );
        assert_eq!(cfg.search.max_area, Some(80.0));
        assert_eq!(cfg.stacking.normalization, Normalization::BottomAnchored);
        assert!(!cfg.symmetry.idealize);
    }

    #[test]
    fn negative_time_limit_is_a_config_error() {
        let mut args = base_build_args();
        args.common.time_limit = Some(-1.0);
        assert!(matches!(
            build_build_config(&args),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn invalid_values_are_rejected_by_core_validation() {
        let mut args = base_build_args();
        args.common.weight = Some(1.5);
        let result = build_build_config(&args);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("weight")));
    }

    #[test]
    fn match_config_merges_sweep_settings() {
        let mut args = base_match_args();
        args.tolerance_step = Some(0.02);
        args.common.set_values = vec!["sweep.max-tolerance=0.08".into()];

        let cfg = build_match_config(&args).unwrap().core_config;
        assert_eq!(cfg.sweep.step, 0.02);
        assert_eq!(cfg.sweep.max_tolerance, 0.08);
        assert_eq!(cfg.sweep.levels().len(), 4);
    }

    #[test]
    fn set_values_reject_bad_format_and_unknown_keys() {
        let cfg = FileConfig::default();
        assert!(apply_set_values(cfg.clone(), &["search.nmax".to_string()]).is_err());
        assert!(apply_set_values(cfg.clone(), &["search.colour=red".to_string()]).is_err());
        assert!(apply_set_values(cfg.clone(), &["nmax=3".to_string()]).is_err());
        assert!(apply_set_values(cfg.clone(), &["search.nmax=three".to_string()]).is_err());
        assert!(
            apply_set_values(cfg, &["stacking.normalization=floating".to_string()]).is_err()
        );
    }

    #[test]
    fn set_values_fill_every_section() {
        let cfg = apply_set_values(
            FileConfig::default(),
            &[
                "search.max-candidates=100".to_string(),
                "stacking.normalization=bottom-anchored".to_string(),
                "symmetry.idealize=false".to_string(),
                "sweep.step=0.01".to_string(),
                "build.max-interfaces=3".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(cfg.search.unwrap().max_candidates, Some(100));
        assert_eq!(
            cfg.stacking.unwrap().normalization,
            Some(Normalization::BottomAnchored)
        );
        assert_eq!(cfg.symmetry.unwrap().idealize, Some(false));
        assert_eq!(cfg.sweep.unwrap().step, Some(0.01));
        assert_eq!(cfg.build.unwrap().max_interfaces, Some(3));
    }
}
