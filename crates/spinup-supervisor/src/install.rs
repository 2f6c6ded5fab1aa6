use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use semver::Version;
use spinup_core::{ArchiveKind, CandidatePayload};

use crate::error::LaunchError;
use crate::layout::ServerLayout;

/// Replaces the installed payload tree with the candidate's contents.
///
/// Order matters: the old tree is removed first, the archive is extracted,
/// and the version marker is written last. A marker is present if and only
/// if extraction fully succeeded, so an interrupted run leaves a tree the
/// next invocation re-detects as "needs install".
pub fn reinstall(
    layout: &ServerLayout,
    candidate: &CandidatePayload,
    version: &Version,
) -> Result<()> {
    replace_payload_tree(layout, candidate)
        .map_err(|err| LaunchError::Install(format!("{err:#}")))?;
    write_version_marker(layout, version)
        .map_err(|err| LaunchError::Install(format!("{err:#}")))?;
    Ok(())
}

fn replace_payload_tree(layout: &ServerLayout, candidate: &CandidatePayload) -> Result<()> {
    let root = layout.payload_root();
    if root.exists() {
        // Removal failure usually means a stale server still has files open;
        // that is fatal here, not retried.
        fs::remove_dir_all(&root)
            .with_context(|| format!("failed to remove existing payload tree: {}", root.display()))?;
    }

    layout.ensure_extract_dir()?;
    extract_archive(&candidate.archive_path, layout.extract_dir(), candidate.kind)?;

    if !root.is_dir() {
        return Err(anyhow!(
            "payload root missing after extraction: {}",
            root.display()
        ));
    }
    Ok(())
}

fn write_version_marker(layout: &ServerLayout, version: &Version) -> Result<()> {
    let path = layout.version_marker_path();
    let mut file = fs::File::create(&path)
        .with_context(|| format!("failed to create version marker: {}", path.display()))?;
    file.write_all(format!("{version}\n").as_bytes())
        .with_context(|| format!("failed to write version marker: {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush version marker: {}", path.display()))?;
    Ok(())
}

fn extract_archive(archive_path: &Path, dst: &Path, kind: ArchiveKind) -> Result<()> {
    match kind {
        ArchiveKind::Zip => extract_zip(archive_path, dst),
        ArchiveKind::TarGz | ArchiveKind::TarZst => extract_tar(archive_path, dst),
    }
}

fn extract_tar(archive_path: &Path, dst: &Path) -> Result<()> {
    run_command(
        Command::new("tar")
            .arg("-xf")
            .arg(archive_path)
            .arg("-C")
            .arg(dst),
        "failed to extract tar archive",
    )
}

fn extract_zip(archive_path: &Path, dst: &Path) -> Result<()> {
    let mut unzip_command = Command::new("unzip");
    unzip_command.arg("-q").arg(archive_path).arg("-d").arg(dst);
    if run_command(&mut unzip_command, "failed to extract zip archive with unzip").is_ok() {
        return Ok(());
    }

    run_command(
        Command::new("tar")
            .arg("-xf")
            .arg(archive_path)
            .arg("-C")
            .arg(dst),
        "failed to extract zip archive with tar fallback",
    )
}

fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}
