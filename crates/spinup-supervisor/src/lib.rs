mod error;
mod install;
mod layout;
mod lock;
mod probe;
mod spawn;
mod supervisor;

pub use error::LaunchError;
pub use install::reinstall;
pub use layout::{ServerLayout, VERSION_MARKER_FILE};
pub use lock::{probe_holder, read_recorded_pid, try_acquire, LockAttempt, LockHandle};
pub use probe::{candidate_version, installed_version};
pub use spawn::{launch_command, PID_PLACEHOLDER};
pub use supervisor::{LaunchMode, Launched, Supervisor};
