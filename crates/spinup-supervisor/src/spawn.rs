use std::ffi::OsString;
use std::io;
use std::os::unix::io::{IntoRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};
use spinup_core::LaunchSpec;

/// Placeholder in the log file path, replaced with the spawned process's own
/// PID before its stdio is redirected.
pub const PID_PLACEHOLDER: &str = "%pid";

/// Builds the flat server command line. Arguments are passed through
/// verbatim; nothing here is validated.
pub fn launch_command(server_bin: &Path, spec: &LaunchSpec) -> Vec<OsString> {
    let mut argv: Vec<OsString> = vec![server_bin.as_os_str().to_os_string()];
    argv.push("--host".into());
    argv.push(spec.host.clone().into());
    argv.push("--port".into());
    argv.push(spec.port.to_string().into());
    argv.push("--server-data-dir".into());
    argv.push(spec.data_dir.clone().into_os_string());
    argv.push("--extensions-dir".into());
    argv.push(spec.ext_dir.clone().into_os_string());
    match &spec.token {
        Some(token) => {
            argv.push("--connection-token".into());
            argv.push(token.clone().into());
        }
        None => argv.push("--without-connection-token".into()),
    }
    argv.extend(spec.extra_args.iter().map(OsString::from));
    argv
}

/// Spawns the server in its own session so it outlives the launcher. The
/// child keeps `lock_fd` open across exec (CLOEXEC cleared after fork), so
/// the kernel lock transfers to the server's lifetime with no unheld window,
/// and redirects its stdio into the log file with `%pid` substituted.
pub fn spawn_detached(argv: &[OsString], log_file: &Path, lock_fd: RawFd) -> Result<Child> {
    let (program, args) = argv
        .split_first()
        .context("launch command must not be empty")?;
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let log_template = log_file.to_string_lossy().into_owned();
    unsafe {
        command.pre_exec(move || {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            if libc::fcntl(lock_fd, libc::F_SETFD, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            redirect_stdio_to_log(&log_template)
        });
    }

    command
        .spawn()
        .with_context(|| format!("failed to spawn server: {}", Path::new(program).display()))
}

/// Spawns the server attached to the launcher's session and stdio. The
/// caller keeps holding the lock and waits for the child itself.
pub fn spawn_foreground(argv: &[OsString]) -> Result<Child> {
    let (program, args) = argv
        .split_first()
        .context("launch command must not be empty")?;
    Command::new(program)
        .args(args)
        .spawn()
        .with_context(|| format!("failed to spawn server: {}", Path::new(program).display()))
}

// Runs between fork and exec; the parent is single-threaded at spawn time.
fn redirect_stdio_to_log(template: &str) -> io::Result<()> {
    let pid = unsafe { libc::getpid() };
    let path = template.replace(PID_PLACEHOLDER, &pid.to_string());
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let fd = file.into_raw_fd();
    unsafe {
        if libc::dup2(fd, libc::STDOUT_FILENO) == -1
            || libc::dup2(fd, libc::STDERR_FILENO) == -1
        {
            return Err(io::Error::last_os_error());
        }
        libc::close(fd);
    }
    Ok(())
}
