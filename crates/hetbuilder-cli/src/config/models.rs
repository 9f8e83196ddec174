use std::path::PathBuf;

pub struct AppConfig<C> {
    pub lower_path: PathBuf,
    pub upper_path: PathBuf,
    pub output_dir: PathBuf,
    pub core_config: C,
}
