//! Lock-file read/write and staleness detection (spec.md §3, §4.C).
//!
//! A lock record advertises a running daemon's pid, socket path, and the
//! mtime of the binary that built it. It is stale if its pid is no longer
//! alive, or if the binary has since been rebuilt — either way, the caller
//! should not trust the daemon it names.

use crate::types::LockRecord;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to read lock file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse lock file: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to write lock file: {0}")]
    Write(#[source] std::io::Error),
}

/// Read the lock record at `lock_path`, if present and parseable.
pub fn read_lock(lock_path: &Path) -> Result<Option<LockRecord>, LockError> {
    let contents = match std::fs::read_to_string(lock_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LockError::Read(e)),
    };
    let record = serde_json::from_str(&contents).map_err(LockError::Parse)?;
    Ok(Some(record))
}

/// Write a fresh lock record, overwriting any existing one.
pub fn write_lock(lock_path: &Path, record: &LockRecord) -> Result<(), LockError> {
    let contents = serde_json::to_string_pretty(record).map_err(LockError::Parse)?;
    std::fs::write(lock_path, contents).map_err(LockError::Write)
}

/// Delete the lock file. Missing files are not an error (clean shutdown may
/// race a concurrent cleanup).
pub fn remove_lock(lock_path: &Path) {
    let _ = std::fs::remove_file(lock_path);
}

/// Build time of the currently running binary, as unix seconds. Falls back
/// to "now" if the executable's mtime cannot be determined, forcing a safe
/// restart instead of trusting a daemon we can't actually compare against.
pub fn current_binary_build_time() -> u64 {
    std::env::current_exe()
        .ok()
        .and_then(|p| std::fs::metadata(p).ok())
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        })
}

/// `is_daemon_stale(lock) = !pid_alive(lock.pid) OR binary_mtime > lock.build_time`
/// (spec.md §4.C, §8).
pub fn is_daemon_stale(record: &LockRecord) -> bool {
    !pid_alive(record.pid) || current_binary_build_time() > record.build_time
}

#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    // POSIX: kill(pid, 0) sends no signal but still validates the pid exists
    // and is visible to us.
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    result == 0
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
    true
}

/// Send `SIGTERM` to a daemon process so it can shut down cleanly.
#[cfg(unix)]
pub fn terminate_pid(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
pub fn terminate_pid(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn roundtrips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".clangd-query.lock");
        let record = LockRecord {
            pid: std::process::id(),
            socket_path: PathBuf::from("/tmp/clangd-query-abc.sock"),
            build_time: 1_700_000_000,
            project_root: dir.path().to_path_buf(),
        };
        write_lock(&lock_path, &record).unwrap();
        let read_back = read_lock(&lock_path).unwrap().unwrap();
        assert_eq!(read_back.pid, record.pid);
        assert_eq!(read_back.socket_path, record.socket_path);
        assert_eq!(read_back.build_time, record.build_time);
    }

    #[test]
    fn missing_lock_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".clangd-query.lock");
        assert!(read_lock(&lock_path).unwrap().is_none());
    }

    #[test]
    fn stale_when_pid_dead() {
        // A pid this large is vanishingly unlikely to be alive.
        let record = LockRecord {
            pid: 1,
            socket_path: PathBuf::from("/tmp/x.sock"),
            build_time: u64::MAX,
            project_root: PathBuf::from("/tmp"),
        };
        // pid 1 (init) is alive on virtually every unix system, so force the
        // dead case with an implausible pid instead.
        let dead = LockRecord { pid: 999_999, ..record };
        assert!(is_daemon_stale(&dead));
    }

    #[test]
    fn stale_when_binary_newer_than_build_time() {
        let record = LockRecord {
            pid: std::process::id(),
            socket_path: PathBuf::from("/tmp/x.sock"),
            build_time: 0,
            project_root: PathBuf::from("/tmp"),
        };
        assert!(is_daemon_stale(&record));
    }
}
