use std::path::Path;

use anyhow::{anyhow, Result};
use spinup_core::{ArchiveKind, CandidatePayload};

/// Payload directories and archives are named `<prefix><platform-suffix>`.
pub const PAYLOAD_PREFIX: &str = "server-";

const ARCHIVE_KINDS: [ArchiveKind; 3] = [ArchiveKind::Zip, ArchiveKind::TarGz, ArchiveKind::TarZst];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPayload {
    pub name: String,
    /// Candidate archive sitting beside the extract dir, if any. Absent when
    /// only the extracted tree remains.
    pub archive: Option<CandidatePayload>,
    pub root_exists: bool,
}

pub fn platform_suffixes(os: &str, arch: &str) -> Result<&'static [&'static str]> {
    match (os, arch) {
        ("macos", "aarch64") => Ok(&["darwin-arm64"]),
        ("linux", "x86_64") => Ok(&["linux-x64", "linux-legacy-x64"]),
        ("linux", "aarch64") => Ok(&["linux-arm64", "linux-legacy-arm64"]),
        (os, arch) => Err(anyhow!("platform {os} {arch} is not supported")),
    }
}

/// Scans `extract_dir` for the one payload matching this machine, as an
/// archive, an extracted tree, or both. An explicit name skips the platform
/// scan entirely.
pub fn discover_payload(extract_dir: &Path, explicit: Option<&str>) -> Result<DiscoveredPayload> {
    if let Some(name) = explicit {
        let inspected = inspect_payload(extract_dir, name);
        if inspected.archive.is_none() && !inspected.root_exists {
            return Err(anyhow!(
                "configured payload '{}' not found in {}",
                name,
                extract_dir.display()
            ));
        }
        return Ok(inspected);
    }

    let suffixes = platform_suffixes(std::env::consts::OS, std::env::consts::ARCH)?;
    discover_among(extract_dir, suffixes)
}

pub(crate) fn discover_among(extract_dir: &Path, suffixes: &[&str]) -> Result<DiscoveredPayload> {
    let mut found = Vec::new();
    for suffix in suffixes {
        let name = format!("{PAYLOAD_PREFIX}{suffix}");
        let inspected = inspect_payload(extract_dir, &name);
        if inspected.archive.is_some() || inspected.root_exists {
            found.push(inspected);
        }
    }

    if found.len() > 1 {
        return Err(anyhow!(
            "multiple server payloads with different platform suffixes found in {}",
            extract_dir.display()
        ));
    }
    found
        .pop()
        .ok_or_else(|| anyhow!("no server payload detected in {}", extract_dir.display()))
}

fn inspect_payload(extract_dir: &Path, name: &str) -> DiscoveredPayload {
    let archive = ARCHIVE_KINDS.iter().find_map(|kind| {
        let path = extract_dir.join(format!("{name}.{}", kind.file_extension()));
        path.is_file()
            .then(|| CandidatePayload::new(name, path, *kind))
    });

    DiscoveredPayload {
        name: name.to_string(),
        archive,
        root_exists: extract_dir.join(name).is_dir(),
    }
}
