use std::path::PathBuf;

use crate::archive::ArchiveKind;

/// A packaged server build waiting beside the extract dir. Read-only input:
/// the launcher probes it and extracts it, never rewrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePayload {
    pub name: String,
    pub archive_path: PathBuf,
    pub kind: ArchiveKind,
}

impl CandidatePayload {
    pub fn new(name: impl Into<String>, archive_path: impl Into<PathBuf>, kind: ArchiveKind) -> Self {
        Self {
            name: name.into(),
            archive_path: archive_path.into(),
            kind,
        }
    }

    /// Path of the manifest inside the archive, relative to the archive root.
    pub fn manifest_member(&self) -> String {
        format!("{}/package.json", self.name)
    }
}
