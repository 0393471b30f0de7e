// logging.rs - Leveled diagnostics for the storage engine.
//
// The crate logs to stderr through a single process-wide severity gate so
// embedders get diagnostics without wiring up a logger. The gate defaults
// to Warn; it can be moved programmatically or through the ZDS_LOG
// environment variable, which is consulted once on first use and never
// again after an explicit set_log_level call.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Once;

/// Severity of a diagnostic message. Lower values are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Error returned when a level name does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLevelError;

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    fn from_u8(raw: u8) -> LogLevel {
        Self::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(LogLevel::Warn)
    }

    fn name(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> std::result::Result<LogLevel, ParseLevelError> {
        Self::ALL
            .iter()
            .find(|level| s.eq_ignore_ascii_case(level.name()))
            .copied()
            .ok_or(ParseLevelError)
    }
}

static SEVERITY_GATE: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static ENV_GATE: Once = Once::new();

/// Move the severity gate. Wins over any pending ZDS_LOG override.
pub fn set_log_level(level: LogLevel) {
    ENV_GATE.call_once(|| {});
    SEVERITY_GATE.store(level as u8, Ordering::Relaxed);
}

/// Current position of the severity gate.
pub fn get_log_level() -> LogLevel {
    apply_env_override();
    LogLevel::from_u8(SEVERITY_GATE.load(Ordering::Relaxed))
}

fn apply_env_override() {
    ENV_GATE.call_once(|| {
        if let Some(level) = std::env::var("ZDS_LOG")
            .ok()
            .and_then(|value| value.parse::<LogLevel>().ok())
        {
            SEVERITY_GATE.store(level as u8, Ordering::Relaxed);
        }
    });
}

/// Sink for the logging macros; messages above the gate are dropped.
#[doc(hidden)]
pub fn emit(level: LogLevel, module: &str, message: fmt::Arguments<'_>) {
    if level <= get_log_level() {
        eprintln!("zds {:>5} {}: {}", level, module, message);
    }
}

/// Log at an explicit severity. The per-level macros below are thin
/// wrappers over this one.
#[macro_export]
macro_rules! zds_log {
    ($level:ident, $($arg:tt)+) => {
        $crate::logging::emit(
            $crate::logging::LogLevel::$level,
            module_path!(),
            format_args!($($arg)+),
        )
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::zds_log!(Error, $($arg)+) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)+) => { $crate::zds_log!(Warn, $($arg)+) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::zds_log!(Info, $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::zds_log!(Debug, $($arg)+) };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)+) => { $crate::zds_log!(Trace, $($arg)+) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("error".parse(), Ok(LogLevel::Error));
        assert_eq!("WARN".parse(), Ok(LogLevel::Warn));
        assert_eq!("Debug".parse(), Ok(LogLevel::Debug));
        assert_eq!("loud".parse::<LogLevel>(), Err(ParseLevelError));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(LogLevel::Info.to_string(), "INFO");
        assert_eq!(LogLevel::Trace.to_string(), "TRACE");
    }

    #[test]
    fn test_gate_round_trip() {
        set_log_level(LogLevel::Debug);
        assert_eq!(get_log_level(), LogLevel::Debug);

        set_log_level(LogLevel::Warn);
        assert_eq!(get_log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_out_of_range_gate_falls_back_to_warn() {
        assert_eq!(LogLevel::from_u8(9), LogLevel::Warn);
    }
}
