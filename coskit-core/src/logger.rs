//! Bridge from the `log` facade to a host-provided [`Logger`].

use std::sync::{Arc, OnceLock};

/// Receives the crate's log records.
///
/// Embedders that do not use the `log` crate themselves (e.g. a host that
/// forwards to its own console) implement this and call [`set_logger`] once.
/// Hosts that already install a `log`-compatible subscriber need not.
///
/// # Examples
///
/// ```rust
/// use coskit_core::logger::{Logger, LogLevel};
///
/// struct ConsoleLogger;
///
/// impl Logger for ConsoleLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         println!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    ///
    /// # Arguments
    ///
    /// * `level` - The severity level of the log message.
    /// * `message` - The log message to be recorded.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Permission state transitions and other very detailed messages.
    Trace,
    /// Per-request decisions.
    Debug,
    /// Ledger and store maintenance.
    Info,
    /// Dropped messages, foreign keys in the store.
    Warn,
    /// Failures the broker could not recover from.
    Error,
}

/// Forwards `log` records to the [`Logger`] given to [`set_logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

/// Debug and trace records are only forwarded from this crate's modules.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let is_from_coskit = module_path.is_some_and(|path| path.starts_with("coskit"));
    let is_debug_or_trace = matches!(level, log::Level::Debug | log::Level::Trace);
    is_from_coskit || !is_debug_or_trace
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Sets the global logger.
///
/// Only the first call has an effect. If another `log` implementation is
/// already installed in the process, records keep going there and this
/// prints a message instead.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        println!("Logger already set");
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use test_case::test_case;

    use super::*;

    #[derive(Default)]
    struct CapturingLogger(Mutex<Vec<(LogLevel, String)>>);

    impl Logger for CapturingLogger {
        fn log(&self, level: LogLevel, message: String) {
            self.0.lock().unwrap().push((level, message));
        }
    }

    #[test_case(log::Level::Trace, Some("coskit_core::consent"), true ; "own trace")]
    #[test_case(log::Level::Debug, Some("tokio::runtime"), false ; "foreign debug")]
    #[test_case(log::Level::Warn, Some("tokio::runtime"), true ; "foreign warn")]
    #[test_case(log::Level::Debug, None, false ; "unknown module debug")]
    fn test_should_forward(level: log::Level, module: Option<&str>, expected: bool) {
        assert_eq!(should_forward(level, module), expected);
    }

    #[test]
    fn test_forwards_to_installed_logger() {
        let capturing = Arc::new(CapturingLogger::default());
        set_logger(capturing.clone());

        log::info!("cleared 3 consent records");

        let captured = capturing.0.lock().unwrap();
        assert!(captured
            .iter()
            .any(|(level, message)| *level == LogLevel::Info
                && message == "cleared 3 consent records"));
    }
}
