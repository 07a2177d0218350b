//! Session logger: one log file per launch in the OS data directory.
//!
//! The file is truncated when the session starts, so it only holds the most
//! recent run. Log location:
//!   Windows:  `%APPDATA%\MaskFE\maskfe.log`
//!   Linux:    `~/.local/share/maskfe/maskfe.log`
//!   macOS:    `~/Library/Application Support/MaskFE/maskfe.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros anywhere in the crate.
//! Before `init` runs (library use, tests) the macros are silent no-ops.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
/// Mirror every line to stderr as well (CLI `--verbose`).
static ECHO: AtomicBool = AtomicBool::new(false);

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

pub fn set_echo(enabled: bool) {
    ECHO.store(enabled, Ordering::Relaxed);
}

/// Write a line to the session log. I/O errors are swallowed.
pub fn write_line(line: &str) {
    if ECHO.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Write a timestamped, level-tagged line to the session log.
pub fn write(level: &str, msg: &str) {
    write_line(&format_line(&timestamp(), level, msg));
}

fn format_line(ts: &str, level: &str, msg: &str) -> String {
    format!("[{}] [{}] {}", ts, level, msg)
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*))
    };
}

/// Open the default session log and install the panic hook. Call once.
pub fn init() {
    init_at(&log_file_path());
}

/// Like [`init`] but with an explicit log file.
pub fn init_at(path: &Path) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path);

    match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.to_path_buf());
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            // Not fatal; the session just runs without a log file.
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    }

    write_line(&format!(
        "=== MaskFE {} session started (unix {}) ===",
        env!("CARGO_PKG_VERSION"),
        unix_seconds().unwrap_or(0)
    ));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format_line(&timestamp(), "PANIC", &info.to_string()));
        prev(info);
    }));
}

fn log_file_path() -> PathBuf {
    #[cfg(any(target_os = "windows", target_os = "macos"))]
    let app_dir = "MaskFE";
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let app_dir = "maskfe";
    data_dir().join(app_dir).join("maskfe.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn unix_seconds() -> Option<u64> {
    SystemTime::now().duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// HH:MM:SS (UTC) within the current day.
fn timestamp() -> String {
    match unix_seconds() {
        Some(secs) => format_clock(secs),
        None => "??:??:??".to_string(),
    }
}

fn format_clock(secs: u64) -> String {
    let h = (secs % 86400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(86_399), "23:59:59");
        assert_eq!(format_clock(86_400 + 3_661), "01:01:01");
    }

    #[test]
    fn line_layout() {
        assert_eq!(format_line("12:00:00", "WARN", "disk full"), "[12:00:00] [WARN] disk full");
    }

    #[test]
    fn macros_are_silent_before_init() {
        log_info!("nothing is listening {}", 1);
        log_err!("still fine");
    }
}
