use std::path::Path;

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tracing::warn;

/// Read the pid recorded in the instance lock file. A garbled file is removed
/// so the next start is not blocked by it.
pub fn read_pid_file(path: &Path) -> Option<u32> {
    let raw = std::fs::read_to_string(path).ok()?;
    match raw.trim().parse::<u32>() {
        Ok(pid) => Some(pid),
        Err(_) => {
            warn!("could not read pid from {}", path.display());
            let _ = std::fs::remove_file(path);
            None
        }
    }
}

pub fn write_pid_file(path: &Path) -> std::io::Result<()> {
    std::fs::write(path, std::process::id().to_string())
}

pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("failed to remove pid file {}: {}", path.display(), e);
    }
}

pub fn process_exists(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);
    sys.process(Pid::from_u32(pid)).is_some()
}

/// Ask a running instance to shut down. Prefers SIGINT so the bot can run its
/// final save; falls back to the platform default kill.
pub fn signal_stop(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);
    match sys.process(Pid::from_u32(pid)) {
        Some(process) => process
            .kill_with(Signal::Interrupt)
            .unwrap_or_else(|| process.kill()),
        None => false,
    }
}
