use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use semver::Version;
use spinup_core::{ArchiveKind, CandidatePayload, PayloadManifest};

use crate::error::LaunchError;
use crate::layout::VERSION_MARKER_FILE;

/// Reads the candidate's version out of the packaged archive without
/// extracting the whole payload.
pub fn candidate_version(candidate: &CandidatePayload) -> Result<Version> {
    let raw = read_manifest_member(candidate)
        .map_err(|err| LaunchError::ArchiveRead(format!("{err:#}")))?;
    let manifest = PayloadManifest::from_json_str(&raw).map_err(|err| {
        LaunchError::ArchiveRead(format!(
            "{}: {err:#}",
            candidate.archive_path.display()
        ))
    })?;
    Ok(manifest.version)
}

/// Reads the version marker of an installed payload tree. A missing root or
/// marker means "no installation"; an unparseable marker counts the same way
/// and forces a reinstall on the next decision.
pub fn installed_version(root: &Path) -> Result<Option<Version>> {
    let marker = root.join(VERSION_MARKER_FILE);
    let raw = match fs::read_to_string(&marker) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read version marker: {}", marker.display()));
        }
    };
    Ok(Version::parse(raw.trim()).ok())
}

fn read_manifest_member(candidate: &CandidatePayload) -> Result<String> {
    let member = candidate.manifest_member();
    let stdout = match candidate.kind {
        ArchiveKind::Zip => capture_command(
            Command::new("unzip")
                .arg("-p")
                .arg(&candidate.archive_path)
                .arg(&member),
            "failed to read manifest from zip archive",
        )?,
        ArchiveKind::TarGz | ArchiveKind::TarZst => capture_command(
            Command::new("tar")
                .arg("-xOf")
                .arg(&candidate.archive_path)
                .arg(&member),
            "failed to read manifest from tar archive",
        )?,
    };

    if stdout.is_empty() {
        return Err(anyhow!(
            "manifest '{}' not found in {}",
            member,
            candidate.archive_path.display()
        ));
    }

    String::from_utf8(stdout).map_err(|_| {
        anyhow!(
            "manifest '{}' in {} is not valid UTF-8",
            member,
            candidate.archive_path.display()
        )
    })
}

fn capture_command(command: &mut Command, context_message: &str) -> Result<Vec<u8>> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(output.stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(anyhow!(
        "{context_message}: status={} stderr='{}'",
        output.status,
        stderr.trim()
    ))
}
