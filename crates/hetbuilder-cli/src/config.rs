mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{build_build_config, build_match_config};
