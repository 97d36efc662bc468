use tracing::warn;

pub const DEFAULT_WARN_THRESHOLD_MS: f64 = 1.0;

/// A round trip that exceeded the warning threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlowSample {
    pub iteration: u64,
    pub elapsed_ms: f64,
}

/// Flags round trips slower than a fixed threshold. Never alters control flow.
#[derive(Debug, Clone, Copy)]
pub struct WarningMonitor {
    threshold_ms: f64,
}

impl Default for WarningMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_THRESHOLD_MS)
    }
}

impl WarningMonitor {
    pub fn new(threshold_ms: f64) -> Self {
        Self { threshold_ms }
    }

    pub fn threshold_ms(&self) -> f64 {
        self.threshold_ms
    }

    // strictly greater: a sample equal to the threshold is fine
    pub fn check(&self, iteration: u64, elapsed_ms: f64) -> Option<SlowSample> {
        if elapsed_ms <= self.threshold_ms {
            return None;
        }
        warn!(
            iteration,
            elapsed_ms,
            "==== Warning: round trip time takes {elapsed_ms} ms! ===="
        );
        Some(SlowSample {
            iteration,
            elapsed_ms,
        })
    }
}
