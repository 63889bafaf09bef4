//! Local outlier filter.
//!
//! Continuous devices substitute the last accepted reading for an outlier,
//! rounded to 2 decimals like any transmitted reading.
//! Binary devices always substitute 0, whatever they last reported.

use crate::types::{is_binary, DeviceConfig, DeviceKind, DeviceState, ValueRange};
use tracing::{debug, warn};

/// Fallback transmitted for an invalid binary reading
pub const BINARY_FALLBACK: f64 = 0.0;

/// Result of filtering one raw reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOutcome {
    /// Reading as generated
    pub raw: f64,
    /// Value to transmit
    pub value: f64,
    pub was_outlier: bool,
}

/// Decides whether a raw reading is accepted and what value goes on the wire
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    device: String,
    kind: DeviceKind,
    range: ValueRange,
}

impl OutlierFilter {
    pub fn new(device: impl Into<String>, kind: DeviceKind, range: ValueRange) -> Self {
        Self {
            device: device.into(),
            kind,
            range,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.name.clone(), config.kind, config.range())
    }

    /// Filter `raw` against the device state, updating the state only on acceptance.
    pub fn apply(&self, raw: f64, state: &mut DeviceState) -> FilterOutcome {
        let outcome = match self.kind {
            DeviceKind::Continuous => {
                if self.range.contains(raw) {
                    // state keeps full precision, only the transmitted value is rounded
                    state.accept(raw);
                    FilterOutcome {
                        raw,
                        value: round2(raw),
                        was_outlier: false,
                    }
                } else {
                    FilterOutcome {
                        raw,
                        value: round2(state.last_accepted()),
                        was_outlier: true,
                    }
                }
            }
            DeviceKind::Binary => {
                if is_binary(raw) {
                    state.accept(raw);
                    FilterOutcome {
                        raw,
                        value: raw,
                        was_outlier: false,
                    }
                } else {
                    FilterOutcome {
                        raw,
                        value: BINARY_FALLBACK,
                        was_outlier: true,
                    }
                }
            }
        };

        if outcome.was_outlier {
            warn!(
                "[{}] Outlier: original {:.2}, sending {:.2}",
                self.device, outcome.raw, outcome.value
            );
        } else {
            debug!("[{}] Accepted reading {:.2}", self.device, outcome.value);
        }

        outcome
    }
}

/// Rounds to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
