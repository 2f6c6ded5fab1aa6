use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use spinup_core::ArchiveKind;

/// Marker written into the payload root after a fully successful extraction.
/// Its presence is the durable signal of "installation complete and valid".
pub const VERSION_MARKER_FILE: &str = ".payload-version";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLayout {
    extract_dir: PathBuf,
    payload: String,
}

impl ServerLayout {
    pub fn new(extract_dir: impl Into<PathBuf>, payload: impl Into<String>) -> Self {
        Self {
            extract_dir: extract_dir.into(),
            payload: payload.into(),
        }
    }

    pub fn extract_dir(&self) -> &Path {
        &self.extract_dir
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn payload_root(&self) -> PathBuf {
        self.extract_dir.join(&self.payload)
    }

    pub fn version_marker_path(&self) -> PathBuf {
        self.payload_root().join(VERSION_MARKER_FILE)
    }

    pub fn archive_path(&self, kind: ArchiveKind) -> PathBuf {
        self.extract_dir
            .join(format!("{}.{}", self.payload, kind.file_extension()))
    }

    pub fn server_bin_path(&self, server_bin: &str) -> PathBuf {
        self.payload_root().join(server_bin)
    }

    pub fn ensure_extract_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.extract_dir)
            .with_context(|| format!("failed to create {}", self.extract_dir.display()))
    }
}
