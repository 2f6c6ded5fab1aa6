use std::path::PathBuf;

/// Everything the server process needs on its command line, assembled once by
/// the config layer and passed through untouched. `log_file` may contain a
/// `%pid` placeholder that is substituted with the spawned process's PID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub host: String,
    pub port: u16,
    pub token: Option<String>,
    pub data_dir: PathBuf,
    pub ext_dir: PathBuf,
    pub log_file: PathBuf,
    pub extra_args: Vec<String>,
}
