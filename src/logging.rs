//! Shared logging sink: `env_logger` to stderr for the CLI client, or a
//! rotating daemon log file plus an in-memory ring buffer (the `logs`
//! daemon method's backing store) for the daemon process.
//!
//! Grounded on the teacher's `env_logger` wiring in `main.rs` (stderr target
//! so stdout stays clean for protocol traffic), used verbatim for the
//! client; the daemon instead installs [`DaemonLogger`], a hand-rolled
//! `log::Log` sink, since it additionally needs to persist to a file and
//! retain a bounded in-memory tail, neither of which `env_logger` supports.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

const RING_CAPACITY: usize = 2000;
/// Truncate the log file when it exceeds this size, keeping only the last
/// 10% (spec.md §4.D bootstrap step 1).
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

struct RingEntry {
    level: Level,
    line: String,
}

struct DaemonLogger {
    file: Mutex<File>,
    ring: Mutex<VecDeque<RingEntry>>,
}

impl Log for DaemonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} [{:<5}] {}: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );

        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "{line}");
            let _ = f.flush();
        }

        let mut ring = self.ring.lock().unwrap();
        if ring.len() >= RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(RingEntry {
            level: record.level(),
            line,
        });
    }

    fn flush(&self) {
        if let Ok(mut f) = self.file.lock() {
            let _ = f.flush();
        }
    }
}

static LOGGER: std::sync::OnceLock<DaemonLogger> = std::sync::OnceLock::new();

/// Install `env_logger` targeting stderr, exactly as the teacher's `main.rs`
/// does. Used by the CLI client, which never needs the ring buffer or a log
/// file.
pub fn init_stderr(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

/// Install the process-wide logger writing to the daemon log file at
/// `log_path`, truncating it to its last 10% first if it has grown past
/// [`MAX_LOG_BYTES`].
pub fn init_daemon_log(log_path: &Path, verbose: bool) -> std::io::Result<()> {
    truncate_if_large(log_path)?;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;

    let logger = LOGGER.get_or_init(|| DaemonLogger {
        file: Mutex::new(file),
        ring: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
    });
    let level = if verbose { LevelFilter::Trace } else { LevelFilter::Info };
    let _ = log::set_logger(logger).map(|()| log::set_max_level(level));
    Ok(())
}

fn truncate_if_large(log_path: &Path) -> std::io::Result<()> {
    let Ok(metadata) = std::fs::metadata(log_path) else {
        return Ok(());
    };
    if metadata.len() <= MAX_LOG_BYTES {
        return Ok(());
    }
    let contents = std::fs::read(log_path)?;
    let keep_from = contents.len() - contents.len() / 10;
    // Land on a line boundary so we don't keep a truncated first line.
    let keep_from = contents[keep_from..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|offset| keep_from + offset + 1)
        .unwrap_or(keep_from);
    std::fs::write(log_path, &contents[keep_from..])
}

/// Collect the in-memory ring buffer's lines at or above `min_level`, oldest
/// first, joined with newlines — the payload for the daemon's `logs` method.
pub fn tail_logs(min_level: Level) -> String {
    let Some(logger) = LOGGER.get() else {
        return String::new();
    };
    let ring = logger.ring.lock().unwrap();
    ring.iter()
        .filter(|entry| entry.level <= min_level)
        .map(|entry| entry.line.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the `logs` method's `level` parameter (`"error" | "info" |
/// "verbose"`) into a [`Level`] threshold.
pub fn parse_level(level: &str) -> Level {
    match level {
        "error" => Level::Error,
        "verbose" => Level::Trace,
        _ => Level::Info,
    }
}
