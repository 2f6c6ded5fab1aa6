use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures that abort a launch. Every variant is fatal for the current run;
/// a subsequent run re-derives state from disk (marker absence, lock
/// liveness) and recovers on its own.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The candidate payload could not be read or its manifest is malformed.
    /// Raised before anything destructive happens.
    #[error("cannot read candidate payload: {0}")]
    ArchiveRead(String),

    /// Removing the old tree or extracting the new one failed. The tree may
    /// be inconsistent, but it carries no version marker, so the next run
    /// treats it as "no valid install".
    #[error("failed to replace installed payload: {0}")]
    Install(String),

    /// The previous instance was asked to terminate but did not release the
    /// lock within the bounded window. No forced kill is attempted.
    #[error("previous instance (pid {pid}) did not exit within {}s", .timeout.as_secs())]
    ShutdownTimeout { pid: u32, timeout: Duration },

    /// A live instance that we did not ask to terminate holds the lock,
    /// e.g. a second launcher racing this one.
    #[error("another live instance holds the lock on {}", .0.display())]
    LockBusy(PathBuf),
}
