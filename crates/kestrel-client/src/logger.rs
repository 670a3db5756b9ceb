//! Logging facade kept consistent with the runtime's own diagnostics.
//!
//! Both halves of the engine log through `tracing`; this module owns the
//! one-shot global subscriber setup. Logs go to the console by default, or to
//! a file when one is named. The `KESTREL_LOG` environment variable overrides
//! the level with a full filter directive.

use std::fs::OpenOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Log verbosity, lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Off,
}

impl Level {
    fn as_filter(self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
            Level::Off => "off",
        }
    }
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Process-global logger configuration.
pub struct Logger;

impl Logger {
    /// Configure the logger if it has not been configured yet.
    ///
    /// Without a level the logger defaults to WARN. With a file name, log
    /// lines append to that file instead of the console. First configuration
    /// wins; the first log call configures defaults implicitly.
    pub fn init(level: Option<Level>, file_name: Option<&str>) {
        if INITIALIZED.swap(true, Ordering::SeqCst) {
            return;
        }

        let filter = match std::env::var("KESTREL_LOG") {
            Ok(directive) => EnvFilter::new(directive),
            Err(_) => EnvFilter::new(level.unwrap_or(Level::Warn).as_filter()),
        };

        let configured = match file_name {
            Some(name) => OpenOptions::new()
                .create(true)
                .append(true)
                .open(name)
                .map_err(|e| e.to_string())
                .and_then(|file| {
                    tracing_subscriber::fmt()
                        .with_env_filter(filter)
                        .with_writer(Arc::new(file))
                        .with_ansi(false)
                        .try_init()
                        .map_err(|e| e.to_string())
                }),
            None => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| e.to_string()),
        };
        if let Err(e) = configured {
            // Another subscriber got there first (embedding application or a
            // test harness); their configuration wins.
            tracing::warn!(error = %e, "logger already configured - keeping existing setup");
        }
    }

    /// Replace-style configuration from the original API surface. The global
    /// subscriber is one-shot, so a second call warns and keeps the first
    /// configuration.
    pub fn set_config(level: Option<Level>, file_name: Option<&str>) {
        if INITIALIZED.load(Ordering::SeqCst) {
            tracing::warn!("logger already configured - ignoring new configuration");
            return;
        }
        Self::init(level, file_name);
    }

    /// Log a message under an identifier that gives it context.
    pub fn log(level: Level, identifier: &str, message: &str) {
        if !INITIALIZED.load(Ordering::SeqCst) {
            Self::init(None, None);
        }
        match level {
            Level::Error => tracing::error!(id = identifier, "{message}"),
            Level::Warn => tracing::warn!(id = identifier, "{message}"),
            Level::Info => tracing::info!(id = identifier, "{message}"),
            Level::Debug => tracing::debug!(id = identifier, "{message}"),
            Level::Trace => tracing::trace!(id = identifier, "{message}"),
            Level::Off => {}
        }
    }
}
