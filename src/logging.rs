//! Timestamped log lines for the view engine and the web service.
//!
//! Everything goes through [`tlog!`], which prefixes the caller's location:
//!
//! ```text
//! 20261018T09:14:03.120 - src/navigator.rs:88 - view v-3: opened c-17 (ReverseChronological, 400 per page)
//! ```
//!
//! On a terminal, view handles and conversation ids are tinted by value so
//! interleaved views can be told apart.  Output defaults to stderr; a writer
//! installed with [`set_writer`] takes over and turns colour off.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex};

use chrono::Utc;

static COLOUR_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_WRITER: LazyLock<Mutex<Box<dyn Write + Send>>> =
    LazyLock::new(|| Mutex::new(Box::new(io::stderr())));

/// Initialize the logging system. Call once at startup before any logging.
/// Detects whether stderr supports ANSI colours.
pub fn init() {
    COLOUR_ENABLED.store(io::stderr().is_terminal(), Ordering::Relaxed);
}

/// Replace the log writer.  All subsequent [`tlog!`] output goes to `w`.
pub fn set_writer(w: Box<dyn Write + Send>) {
    COLOUR_ENABLED.store(false, Ordering::Relaxed);
    let mut writer = LOG_WRITER.lock().unwrap_or_else(|e| e.into_inner());
    *writer = w;
}

/// Returns whether ANSI colour output is enabled.
pub fn colour_enabled() -> bool {
    COLOUR_ENABLED.load(Ordering::Relaxed)
}

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

const ID_COLOURS: &[&str] = &[
    "\x1b[91m", "\x1b[92m", "\x1b[93m", "\x1b[94m", "\x1b[95m", "\x1b[96m",
];

fn hash_colour(value: u64) -> &'static str {
    let hash = value.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32;
    ID_COLOURS[(hash as usize) % ID_COLOURS.len()]
}

fn tagged(prefix: char, value: u64, shown: &str) -> String {
    if colour_enabled() {
        format!("{}{prefix}-{shown}{RESET}", hash_colour(value))
    } else {
        format!("{prefix}-{shown}")
    }
}

/// Format a view handle number, e.g. `v-3`.
pub fn view(id: u64) -> String {
    tagged('v', id, &id.to_string())
}

/// Format a conversation id, e.g. `c-17`.
pub fn conversation(id: i64) -> String {
    tagged('c', id as u64, &id.to_string())
}

/// Format the current wall-clock time as `YYYYMMDDTHH:MM:SS.mmm` (UTC).
pub fn format_timestamp() -> String {
    Utc::now().format("%Y%m%dT%H:%M:%S%.3f").to_string()
}

/// Write a single log line to the current writer.
///
/// Called by the [`tlog!`] macro; not intended for direct use.
pub fn emit(file: &str, line: u32, msg: &str) {
    let ts = format_timestamp();
    let formatted = if colour_enabled() {
        format!("{DIM}{ts}{RESET} {DIM}{file}:{line}{RESET} {msg}")
    } else {
        format!("{ts} - {file}:{line} - {msg}")
    };
    let mut writer = LOG_WRITER.lock().unwrap_or_else(|e| e.into_inner());
    let _ = writeln!(*writer, "{formatted}");
}

/// Emit a log line with timestamp and source location.
///
/// ```ignore
/// tlog!("view {}: older edge exhausted", logging::view(3));
/// ```
#[macro_export]
macro_rules! tlog {
    ($($arg:tt)*) => {{
        $crate::logging::emit(file!(), line!(), &format!($($arg)*));
    }};
}
