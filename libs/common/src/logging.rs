//! Unified logging module for the terminal sync tools
//!
//! Console output uses a bracketed level format, an optional daily file sink
//! is written through a non-blocking appender, and the active filter can be
//! swapped at runtime.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Environment variable overriding the log directory
pub const ENV_LOG_DIR: &str = "SYNC_LOG_DIR";

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2026-02-10T10:39:00.269000Z [INFO] Loaded sync detail`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the non-blocking file writer flushing for the life of the process
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

// ============================================================================
// Log Root Directory Configuration
// ============================================================================

/// Global log root directory (initialized once from config or env)
/// Priority: SYNC_LOG_DIR env > config_dir > default "logs"
static LOG_ROOT: OnceLock<PathBuf> = OnceLock::new();

/// Initialize log root directory from config or environment
pub fn init_log_root(config_dir: Option<&str>) {
    LOG_ROOT.get_or_init(|| {
        std::env::var(ENV_LOG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                config_dir
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("logs"))
            })
    });
}

/// Get log root directory
///
/// Falls back to the environment or `logs` when [`init_log_root`] was never
/// called. Test binaries log under the system temp directory instead.
pub fn get_log_root() -> PathBuf {
    LOG_ROOT.get().cloned().unwrap_or_else(|| {
        std::env::var(ENV_LOG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                if is_test_environment() {
                    std::env::temp_dir().join("terminal-sync-test-logs")
                } else {
                    PathBuf::from("logs")
                }
            })
    })
}

/// Detect if we're running in a test environment
fn is_test_environment() -> bool {
    if std::env::var("CARGO_TARGET_TMPDIR").is_ok() {
        return true;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(path_str) = exe.to_str() {
            if path_str.contains("target/debug/deps") || path_str.contains("target/release/deps") {
                return true;
            }
        }
    }

    false
}

// Dynamic log level reload support
type EnvFilterReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
static LOG_FILTER_HANDLE: OnceLock<EnvFilterReloadHandle> = OnceLock::new();
static CURRENT_LOG_LEVEL: OnceLock<Mutex<String>> = OnceLock::new();

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, used as the log file prefix (e.g., "syncctl")
    pub service_name: String,
    /// Base directory for logs
    pub log_dir: PathBuf,
    /// Console log level
    pub console_level: Level,
    /// File log level
    pub file_level: Level,
    /// Emit JSON lines on the console instead of the bracketed format
    pub enable_json: bool,
    /// Also write a daily rolling log file under `log_dir`
    pub enable_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "terminal-sync".to_string(),
            log_dir: get_log_root(),
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            enable_json: false,
            enable_file: false,
        }
    }
}

/// Initialize logging system with configuration
///
/// `RUST_LOG` takes precedence over `console_level` when set.
pub fn init_with_config(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let initial_level = config.console_level.to_string().to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(initial_level.as_str()));
    let (filter_layer, filter_handle) = reload::Layer::new(filter);

    let plain_layer = (!config.enable_json).then(|| {
        fmt::layer()
            .event_format(BracketedLevelFormat)
            .with_writer(std::io::stderr)
    });
    let json_layer = config.enable_json.then(|| {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
    });

    let file_layer = if config.enable_file {
        fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(
            &config.log_dir,
            format!("{}.log", config.service_name),
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        // A second init keeps the first guard; the new writer is dropped with the error below
        let _ = FILE_GUARD.set(guard);
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .with_filter(LevelFilter::from_level(config.file_level)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(plain_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()?;

    let _ = LOG_FILTER_HANDLE.set(filter_handle);
    let _ = CURRENT_LOG_LEVEL.set(Mutex::new(initial_level));

    tracing::debug!(
        "Logging initialized for {} (file sink: {})",
        config.service_name,
        config.enable_file
    );
    Ok(())
}

/// Shorthand init with just a console level
pub fn init(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = LogConfig {
        console_level: level.parse().unwrap_or(Level::INFO),
        ..Default::default()
    };
    init_with_config(config)
}

/// Dynamically set log filter level at runtime
///
/// # Arguments
/// * `level` - Log level string (e.g., "debug") or full filter spec
///   (e.g., "info,terminal_sync=debug")
pub fn set_log_level(level: &str) -> Result<(), String> {
    let handle = LOG_FILTER_HANDLE
        .get()
        .ok_or("Logging not initialized with reload support")?;

    let new_filter =
        EnvFilter::try_new(level).map_err(|e| format!("Invalid log level '{}': {}", level, e))?;

    handle
        .reload(new_filter)
        .map_err(|e| format!("Failed to reload log filter: {}", e))?;

    if let Some(current) = CURRENT_LOG_LEVEL.get() {
        if let Ok(mut guard) = current.lock() {
            *guard = level.to_string();
        }
    }

    tracing::info!("Log level changed to: {}", level);
    Ok(())
}

/// Get current log filter level
pub fn get_log_level() -> String {
    CURRENT_LOG_LEVEL
        .get()
        .and_then(|m| m.lock().ok())
        .map(|guard| guard.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_level_brackets() {
        assert_eq!(format_level(&Level::INFO), "[INFO]");
        assert_eq!(format_level(&Level::ERROR), "[ERROR]");
    }

    #[test]
    fn test_default_config_is_console_only() {
        let config = LogConfig::default();
        assert!(!config.enable_file);
        assert!(!config.enable_json);
        assert_eq!(config.console_level, Level::INFO);
    }

    #[test]
    fn test_set_level_before_init_fails() {
        // No subscriber installed in this test binary
        if LOG_FILTER_HANDLE.get().is_none() {
            assert!(set_log_level("debug").is_err());
            assert_eq!(get_log_level(), "unknown");
        }
    }
}
