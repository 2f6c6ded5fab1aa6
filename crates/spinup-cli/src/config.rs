use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use spinup_core::LaunchSpec;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_DATADIR: &str = "./server-data";

/// Launcher configuration, read once from a JSON file at startup and threaded
/// through by parameter from there. A missing file means "all defaults"; a
/// present but unreadable or malformed file is an error.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LauncherConfig {
    pub host: String,
    pub port: u16,
    pub token: Option<String>,
    pub data_dir: PathBuf,
    pub ext_dir: PathBuf,
    pub extract_dir: PathBuf,
    pub pidfile: PathBuf,
    pub logfile: PathBuf,
    pub extra_args: Vec<String>,
    /// Explicit payload stem; skips platform discovery when set.
    pub payload: Option<String>,
    /// Server executable, relative to the payload root.
    pub server_bin: String,
    pub shutdown_timeout_secs: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        let base = PathBuf::from(DEFAULT_BASE_DATADIR);
        Self {
            host: "127.0.0.1".to_string(),
            port: 3250,
            token: None,
            data_dir: base.join("data"),
            ext_dir: base.join("extensions"),
            extract_dir: PathBuf::from("."),
            pidfile: PathBuf::from("run.pid"),
            logfile: base.join("server-%pid.log"),
            extra_args: Vec::new(),
            payload: None,
            server_bin: "bin/server".to_string(),
            shutdown_timeout_secs: 10,
        }
    }
}

impl LauncherConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config file: {}", path.display()));
            }
        };
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Creates the parent directories of every configured path. The server
    /// process creates the leaf directories itself.
    pub fn ensure_parent_dirs(&self) -> Result<()> {
        for path in [
            &self.data_dir,
            &self.ext_dir,
            &self.extract_dir,
            &self.pidfile,
            &self.logfile,
        ] {
            let Some(parent) = path.parent() else {
                continue;
            };
            if parent.as_os_str().is_empty() {
                continue;
            }
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Ok(())
    }

    pub fn launch_spec(&self) -> LaunchSpec {
        LaunchSpec {
            host: self.host.clone(),
            port: self.port,
            token: self.token.clone(),
            data_dir: self.data_dir.clone(),
            ext_dir: self.ext_dir.clone(),
            log_file: self.logfile.clone(),
            extra_args: self.extra_args.clone(),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
