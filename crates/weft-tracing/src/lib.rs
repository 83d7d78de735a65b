//! Logging setup for the weft workspace
//!
//! Every binary, test and benchmark installs its subscriber through this
//! crate, so events from the handles, algorithms and devices are formatted
//! one way and filtered by the same variables.
//!
//! ```text
//!   LogConfig ──► EnvFilter + fmt layer ──► global subscriber
//!       │
//!       └──────► performance::configure (primitive spans, threshold)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use weft_tracing::{LogConfig, LogFormat};
//!
//! let config = LogConfig {
//!     filter: Some("weft_core=debug".to_string()),
//!     format: LogFormat::Compact,
//!     ..LogConfig::development()
//! };
//! assert!(weft_tracing::build_subscriber(&config).is_ok());
//! ```
//!
//! # Environment
//!
//! - `WEFT_LOG_PROFILE` - `development` (default), `ci` or `profiling`
//! - `WEFT_LOG` - filter directives; falls back to `RUST_LOG`
//! - `WEFT_LOG_FORMAT` - `pretty`, `compact` or `json`
//! - `WEFT_PERF` - `off`, `on`, or a threshold in microseconds below which
//!   primitive spans stay silent

pub mod performance;

#[macro_use]
pub mod macros;

use std::env;
use std::sync::Once;
use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

pub use performance::{PerfSettings, PrimitiveSpan, TransferDirection};

/// Failure to install the shared subscriber.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid log filter `{directives}`: {reason}")]
    InvalidFilter { directives: String, reason: String },

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Formatter layer choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directives. `None` defers to `RUST_LOG`, then `fallback`.
    pub filter: Option<String>,
    pub fallback: String,
    pub format: LogFormat,
    pub ansi: bool,
    /// Emit an event when each span closes (carries `time.busy`/`time.idle`).
    pub close_spans: bool,
    pub perf: PerfSettings,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl LogConfig {
    /// Human-readable output; primitive spans on in debug builds.
    pub fn development() -> Self {
        Self {
            filter: None,
            fallback: "info".to_string(),
            format: LogFormat::Pretty,
            ansi: true,
            close_spans: false,
            perf: PerfSettings {
                enabled: cfg!(debug_assertions),
                threshold_us: None,
            },
        }
    }

    /// JSON lines without colour; primitive spans off.
    pub fn ci() -> Self {
        Self {
            format: LogFormat::Json,
            ansi: false,
            perf: PerfSettings::default(),
            ..Self::development()
        }
    }

    /// Debug-level events from the weft crates with span timings.
    pub fn profiling() -> Self {
        Self {
            filter: Some("weft_backends=debug,weft_core=debug,weft_tracing=debug".to_string()),
            format: LogFormat::Json,
            ansi: false,
            close_spans: true,
            perf: PerfSettings {
                enabled: true,
                threshold_us: None,
            },
            ..Self::development()
        }
    }

    /// Apply `WEFT_*` overrides on top of the selected profile.
    pub fn from_env() -> Self {
        let mut config = match env::var("WEFT_LOG_PROFILE").as_deref().map(str::trim) {
            Ok("ci") => Self::ci(),
            Ok("profiling") => Self::profiling(),
            _ => Self::development(),
        };

        if let Some(filter) = non_empty_var("WEFT_LOG") {
            config.filter = Some(filter);
        }
        if let Some(format) = non_empty_var("WEFT_LOG_FORMAT").and_then(|value| LogFormat::parse(&value)) {
            config.format = format;
            if format == LogFormat::Json {
                config.ansi = false;
            }
        }
        if let Some(perf) = non_empty_var("WEFT_PERF") {
            config.perf = PerfSettings::parse(&perf, config.perf);
        }
        config
    }

    fn env_filter(&self) -> Result<EnvFilter, SetupError> {
        let directives = self
            .filter
            .clone()
            .or_else(|| non_empty_var(EnvFilter::DEFAULT_ENV))
            .unwrap_or_else(|| self.fallback.clone());
        EnvFilter::try_new(&directives).map_err(|err| SetupError::InvalidFilter {
            directives,
            reason: err.to_string(),
        })
    }

    fn span_events(&self) -> FmtSpan {
        if self.close_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Subscriber for `config`, not yet installed.
pub fn build_subscriber(config: &LogConfig) -> Result<impl Subscriber + Send + Sync, SetupError> {
    let filter = config.env_filter()?;
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(config.ansi)
            .with_span_events(config.span_events())
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(config.ansi)
            .with_span_events(config.span_events())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_ansi(false)
            .with_span_events(config.span_events())
            .boxed(),
    };
    Ok(Registry::default().with(layer).with(filter))
}

/// Install the subscriber process-wide and apply the performance settings.
pub fn init(config: &LogConfig) -> Result<(), SetupError> {
    performance::configure(config.perf);
    build_subscriber(config)?.try_init()?;
    Ok(())
}

static TEST_INIT: Once = Once::new();

/// Route events to the test harness's captured output.
///
/// Safe to call from every test; only the first call installs anything, and
/// a subscriber installed by someone else is left in place.
pub fn init_for_tests() {
    TEST_INIT.call_once(|| {
        let filter = non_empty_var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|| "warn".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in ["WEFT_LOG_PROFILE", "WEFT_LOG", "WEFT_LOG_FORMAT", "WEFT_PERF", "RUST_LOG"] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let config = LogConfig {
            filter: Some("=::nope".to_string()),
            ..LogConfig::ci()
        };
        match build_subscriber(&config) {
            Err(SetupError::InvalidFilter { directives, .. }) => assert_eq!(directives, "=::nope"),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("invalid filter accepted"),
        }
    }

    #[test]
    fn test_presets_build() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        for config in [LogConfig::development(), LogConfig::ci(), LogConfig::profiling()] {
            assert!(build_subscriber(&config).is_ok(), "{config:?}");
        }
    }

    #[test]
    fn test_env_overrides_profile() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("WEFT_LOG_PROFILE", "profiling");
        env::set_var("WEFT_LOG_FORMAT", "compact");
        env::set_var("WEFT_LOG", "weft_core=trace");
        env::set_var("WEFT_PERF", "250");

        let config = LogConfig::from_env();
        clear_env();
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.filter.as_deref(), Some("weft_core=trace"));
        assert!(config.close_spans);
        assert_eq!(
            config.perf,
            PerfSettings {
                enabled: true,
                threshold_us: Some(250)
            }
        );
    }

    #[test]
    fn test_unknown_format_keeps_profile() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("WEFT_LOG_PROFILE", "ci");
        env::set_var("WEFT_LOG_FORMAT", "xml");
        let config = LogConfig::from_env();
        clear_env();
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.ansi);
    }

    #[test]
    fn test_init_for_tests_is_idempotent() {
        init_for_tests();
        init_for_tests();
        tracing::warn!("captured by the test writer");
    }
}
