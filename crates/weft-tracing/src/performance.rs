//! Timing for device primitives and host/device transfers
//!
//! A [`PrimitiveSpan`] wraps one call of a device primitive (sort, scan,
//! schedule, ...). It opens a `primitive` span carrying the operation, device
//! and element count, and on drop reports the duration and element
//! throughput. [`record_transfer`] reports one explicit copy between the
//! control and execution environments.
//!
//! ```rust
//! use std::time::Duration;
//! use weft_tracing::performance::{record_transfer, PrimitiveSpan, TransferDirection};
//!
//! {
//!     let _span = PrimitiveSpan::start("sort", "serial", 1024);
//! }
//! record_transfer(TransferDirection::HostToDevice, 4096, Duration::from_micros(12));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::span::EnteredSpan;

static ENABLED: AtomicBool = AtomicBool::new(true);

// u64::MAX: no threshold
static THRESHOLD_US: AtomicU64 = AtomicU64::new(u64::MAX);

/// Process-wide switches for [`PrimitiveSpan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfSettings {
    pub enabled: bool,
    /// Spans shorter than this report nothing.
    pub threshold_us: Option<u64>,
}

impl PerfSettings {
    /// Parse `off`, `on`, or a threshold in microseconds; anything else keeps
    /// `current`.
    pub fn parse(value: &str, current: Self) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" | "0" | "false" | "no" => Self {
                enabled: false,
                threshold_us: None,
            },
            "on" | "true" | "yes" => Self {
                enabled: true,
                threshold_us: current.threshold_us,
            },
            other => match other.parse::<u64>() {
                Ok(threshold) => Self {
                    enabled: true,
                    threshold_us: Some(threshold),
                },
                Err(_) => current,
            },
        }
    }
}

pub fn configure(settings: PerfSettings) {
    ENABLED.store(settings.enabled, Ordering::Relaxed);
    THRESHOLD_US.store(settings.threshold_us.unwrap_or(u64::MAX), Ordering::Relaxed);
}

pub fn settings() -> PerfSettings {
    PerfSettings {
        enabled: ENABLED.load(Ordering::Relaxed),
        threshold_us: match THRESHOLD_US.load(Ordering::Relaxed) {
            u64::MAX => None,
            threshold => Some(threshold),
        },
    }
}

/// Guard timing one device primitive.
#[must_use = "the span reports when dropped"]
pub struct PrimitiveSpan {
    operation: &'static str,
    elements: usize,
    start: Instant,
    report: bool,
    threshold_us: Option<u64>,
    _entered: EnteredSpan,
}

impl PrimitiveSpan {
    pub fn start(operation: &'static str, device: &'static str, elements: usize) -> Self {
        let PerfSettings { enabled, threshold_us } = settings();
        let span = tracing::debug_span!("primitive", operation, device, elements);
        Self {
            operation,
            elements,
            start: Instant::now(),
            report: enabled,
            threshold_us,
            _entered: span.entered(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn elements(&self) -> usize {
        self.elements
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl fmt::Debug for PrimitiveSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveSpan")
            .field("operation", &self.operation)
            .field("elements", &self.elements)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

impl Drop for PrimitiveSpan {
    fn drop(&mut self) {
        if !self.report {
            return;
        }
        let elapsed = self.elapsed();
        let duration_us = elapsed.as_micros() as u64;
        if self.threshold_us.is_some_and(|threshold| duration_us < threshold) {
            return;
        }
        tracing::debug!(
            duration_us,
            melems_per_sec = per_second(self.elements as f64, elapsed) / 1e6,
            "primitive complete"
        );
    }
}

fn per_second(amount: f64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        amount / secs
    } else {
        0.0
    }
}

/// Which way an explicit copy moved data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Control environment to execution environment
    HostToDevice,
    /// Execution environment back to the control environment
    DeviceToHost,
}

impl TransferDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostToDevice => "H2D",
            Self::DeviceToHost => "D2H",
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bandwidth in MiB/s.
pub fn bandwidth_mib_per_sec(bytes: usize, elapsed: Duration) -> f64 {
    per_second(bytes as f64, elapsed) / (1024.0 * 1024.0)
}

pub fn record_transfer(direction: TransferDirection, bytes: usize, elapsed: Duration) {
    tracing::debug!(
        direction = direction.as_str(),
        bytes,
        duration_us = elapsed.as_micros() as u64,
        bandwidth_mib_per_sec = bandwidth_mib_per_sec(bytes, elapsed),
        "transfer complete"
    );
}
