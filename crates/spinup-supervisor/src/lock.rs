use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

use anyhow::{Context, Result};

/// Holder of the exclusive advisory lock on the pidfile. The kernel releases
/// the lock when every descriptor of the underlying open file closes, which
/// happens on process exit of any kind; crash safety never depends on
/// [`LockHandle::release`] being called.
#[derive(Debug)]
pub struct LockHandle {
    file: File,
}

#[derive(Debug)]
pub enum LockAttempt {
    Acquired(LockHandle),
    Busy,
}

/// Attempts a non-blocking exclusive lock on `path`, creating the file if
/// absent. The file is never truncated here: its contents belong to whoever
/// holds the lock.
pub fn try_acquire(path: &Path) -> Result<LockAttempt> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open lock file: {}", path.display()))?;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(LockAttempt::Acquired(LockHandle { file }));
    }

    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        return Ok(LockAttempt::Busy);
    }
    Err(err).with_context(|| format!("failed to lock {}", path.display()))
}

/// Reads the PID recorded in the lock file. Advisory only: a PID with no
/// held lock is stale data left by a dead process, to be overwritten, not
/// an error. Garbage content reads as `None` for the same reason.
pub fn read_recorded_pid(path: &Path) -> Result<Option<u32>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read lock file: {}", path.display()));
        }
    };
    Ok(raw.trim().parse().ok())
}

/// Reports who currently owns the lock without keeping it: `None` when the
/// lock is free, otherwise the recorded PID of the live holder.
pub fn probe_holder(path: &Path) -> Result<Option<u32>> {
    match try_acquire(path)? {
        LockAttempt::Acquired(handle) => {
            handle.release()?;
            Ok(None)
        }
        LockAttempt::Busy => read_recorded_pid(path),
    }
}

impl LockHandle {
    /// Overwrites the file with `pid`. Only reachable on a held handle, so
    /// the file can never claim an owner that does not hold the lock.
    pub fn write_pid(&mut self, pid: u32) -> Result<()> {
        self.file
            .set_len(0)
            .context("failed to truncate lock file")?;
        self.file
            .seek(SeekFrom::Start(0))
            .context("failed to rewind lock file")?;
        self.file
            .write_all(format!("{pid}\n").as_bytes())
            .context("failed to write pid to lock file")?;
        self.file.flush().context("failed to flush lock file")?;
        Ok(())
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Explicit unlock for graceful shutdown paths.
    pub fn release(self) -> Result<()> {
        let rc = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        if rc != 0 {
            return Err(io::Error::last_os_error()).context("failed to unlock lock file");
        }
        Ok(())
    }

    /// Closes this process's descriptor without unlocking. The spawned
    /// server inherited the descriptor, so the kernel lock stays held for
    /// the server's lifetime and releases the instant it exits.
    pub fn detach(self) {
        drop(self.file);
    }
}
