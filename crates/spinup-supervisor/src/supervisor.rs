use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use semver::Version;
use spinup_core::{CandidatePayload, LaunchSpec};

use crate::error::LaunchError;
use crate::install;
use crate::layout::ServerLayout;
use crate::lock::{self, LockAttempt, LockHandle};
use crate::probe;
use crate::spawn;

const POLL_INITIAL: Duration = Duration::from_millis(50);
const POLL_MAX: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Own session, stdio into the log file; the server outlives the
    /// launcher and carries the lock with it.
    Detached,
    /// Launcher's session and stdio; the launcher holds the lock and waits
    /// for the server to exit.
    Foreground,
}

#[derive(Debug)]
pub struct Launched {
    pub pid: u32,
    pub version: Version,
    pub reinstalled: bool,
    /// Present only in foreground mode, after the server exited.
    pub exit: Option<ExitStatus>,
}

#[derive(Debug)]
pub struct Supervisor {
    pub layout: ServerLayout,
    pub pidfile: PathBuf,
    pub server_bin: String,
    pub shutdown_timeout: Duration,
    pub mode: LaunchMode,
}

impl Supervisor {
    /// Single entry point: decides whether the candidate needs installing,
    /// stops a running previous instance when it does, and launches a fresh
    /// server with the lock held. Any failure before the spawn aborts the
    /// run with no process started.
    pub fn run(&self, spec: &LaunchSpec, candidate: &CandidatePayload) -> Result<Launched> {
        let candidate_version = probe::candidate_version(candidate)?;
        let installed = probe::installed_version(&self.layout.payload_root())?;
        let unchanged = installed.as_ref() == Some(&candidate_version);

        let handle = if unchanged {
            // Fast path: no stop, no reinstall. The lock is still taken
            // fresh; a launch never proceeds without holding it.
            self.acquire_or_busy()?
        } else {
            let handle = self.acquire_stopping_previous()?;
            install::reinstall(&self.layout, candidate, &candidate_version)?;
            handle
        };

        self.spawn_with_lock(handle, spec, candidate_version, !unchanged)
    }

    /// Launches the already-installed payload when no candidate archive is
    /// around anymore. Requires a valid version marker.
    pub fn launch_installed(&self, spec: &LaunchSpec) -> Result<Launched> {
        let root = self.layout.payload_root();
        let version = probe::installed_version(&root)?
            .ok_or_else(|| anyhow!("no payload installed at {}", root.display()))?;
        let handle = self.acquire_or_busy()?;
        self.spawn_with_lock(handle, spec, version, false)
    }

    fn acquire_or_busy(&self) -> Result<LockHandle> {
        match lock::try_acquire(&self.pidfile)? {
            LockAttempt::Acquired(handle) => Ok(handle),
            LockAttempt::Busy => Err(LaunchError::LockBusy(self.pidfile.clone()).into()),
        }
    }

    /// Acquires the lock for an upgrade, asking a running previous instance
    /// to terminate first. The wait is a bounded wait-for-effect loop on the
    /// one termination request we issued, never a retry-on-error loop.
    fn acquire_stopping_previous(&self) -> Result<LockHandle> {
        if let LockAttempt::Acquired(handle) = lock::try_acquire(&self.pidfile)? {
            return Ok(handle);
        }

        // Lock held but no recorded owner: a concurrent launcher is mid
        // sequence. There is nobody we may legitimately stop.
        let pid = lock::read_recorded_pid(&self.pidfile)?
            .ok_or_else(|| LaunchError::LockBusy(self.pidfile.clone()))?;
        request_termination(pid)?;

        let deadline = Instant::now() + self.shutdown_timeout;
        let mut backoff = POLL_INITIAL;
        loop {
            if let LockAttempt::Acquired(handle) = lock::try_acquire(&self.pidfile)? {
                return Ok(handle);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(LaunchError::ShutdownTimeout {
                    pid,
                    timeout: self.shutdown_timeout,
                }
                .into());
            }
            thread::sleep(backoff.min(deadline - now));
            backoff = (backoff * 2).min(POLL_MAX);
        }
    }

    fn spawn_with_lock(
        &self,
        mut handle: LockHandle,
        spec: &LaunchSpec,
        version: Version,
        reinstalled: bool,
    ) -> Result<Launched> {
        let argv = spawn::launch_command(&self.layout.server_bin_path(&self.server_bin), spec);

        match self.mode {
            LaunchMode::Detached => {
                let child = spawn::spawn_detached(&argv, &spec.log_file, handle.as_raw_fd())?;
                let pid = child.id();
                handle.write_pid(pid)?;
                handle.detach();
                Ok(Launched {
                    pid,
                    version,
                    reinstalled,
                    exit: None,
                })
            }
            LaunchMode::Foreground => {
                let mut child = spawn::spawn_foreground(&argv)?;
                let pid = child.id();
                handle.write_pid(pid)?;
                let exit = child
                    .wait()
                    .context("failed waiting for server process")?;
                handle.release()?;
                Ok(Launched {
                    pid,
                    version,
                    reinstalled,
                    exit: Some(exit),
                })
            }
        }
    }
}

fn request_termination(pid: u32) -> Result<()> {
    let rc = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    // Already gone; the lock comes free on its own.
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err).with_context(|| format!("failed to signal pid {pid}"))
}
