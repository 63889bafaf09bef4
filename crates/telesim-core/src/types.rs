//! Device configuration and per-device state

use crate::error::{CoreError, Result};
use crate::random::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// How a device produces and validates readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Real-valued sensor drifting around its last accepted reading
    #[default]
    Continuous,
    /// Discrete {0, 1} detector (e.g. leak detection)
    Binary,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Continuous => "continuous",
            DeviceKind::Binary => "binary",
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive bounds of an acceptable continuous reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Inclusive on both ends. NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Bounds of the random wait between two publishes, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PublishInterval {
    pub low_secs: f64,
    pub high_secs: f64,
}

impl Default for PublishInterval {
    fn default() -> Self {
        Self {
            low_secs: 4.0,
            high_secs: 7.0,
        }
    }
}

impl PublishInterval {
    pub fn new(low_secs: f64, high_secs: f64) -> Self {
        Self {
            low_secs,
            high_secs,
        }
    }

    /// Fixed interval, mostly useful in tests
    pub fn fixed(secs: f64) -> Self {
        Self::new(secs, secs)
    }

    /// Draws a wait duration uniformly from `[low_secs, high_secs]`.
    pub fn sample(&self, rng: &mut dyn RandomSource) -> Duration {
        let secs = if self.high_secs > self.low_secs {
            rng.uniform(self.low_secs, self.high_secs)
        } else {
            self.low_secs
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Secondary reading published next to the main one.
///
/// Drawn uniformly from `[low, high]` every tick and sent rounded to 2
/// decimals. It never passes through the outlier filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraMetric {
    pub key: String,
    pub low: f64,
    pub high: f64,
}

impl ExtraMetric {
    pub fn new(key: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            key: key.into(),
            low,
            high,
        }
    }
}

/// Immutable description of one simulated device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Label, unique within a run
    pub name: String,

    /// Opaque credential handed to the broker
    pub access_token: String,

    /// Field name used in the emitted payload (e.g. "temp_rack")
    pub telemetry_key: String,

    pub min_limit: f64,
    pub max_limit: f64,

    /// Seed for the last accepted reading
    pub initial_value: f64,

    #[serde(default)]
    pub kind: DeviceKind,

    #[serde(default)]
    pub publish_interval: PublishInterval,

    /// Add `"timestamp": <epoch millis>` to every payload
    #[serde(default)]
    pub include_timestamp: bool,

    /// Unfiltered readings added to every payload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_metrics: Vec<ExtraMetric>,
}

impl DeviceConfig {
    /// A real-valued sensor with the default 4-7 s cadence
    pub fn continuous(
        name: impl Into<String>,
        access_token: impl Into<String>,
        telemetry_key: impl Into<String>,
        min_limit: f64,
        max_limit: f64,
        initial_value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            access_token: access_token.into(),
            telemetry_key: telemetry_key.into(),
            min_limit,
            max_limit,
            initial_value,
            kind: DeviceKind::Continuous,
            publish_interval: PublishInterval::default(),
            include_timestamp: false,
            extra_metrics: Vec::new(),
        }
    }

    /// A {0, 1} detector idling at 0
    pub fn binary(
        name: impl Into<String>,
        access_token: impl Into<String>,
        telemetry_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            access_token: access_token.into(),
            telemetry_key: telemetry_key.into(),
            min_limit: 0.0,
            max_limit: 1.0,
            initial_value: 0.0,
            kind: DeviceKind::Binary,
            publish_interval: PublishInterval::default(),
            include_timestamp: false,
            extra_metrics: Vec::new(),
        }
    }

    pub fn with_interval(mut self, interval: PublishInterval) -> Self {
        self.publish_interval = interval;
        self
    }

    pub fn with_timestamp(mut self, include: bool) -> Self {
        self.include_timestamp = include;
        self
    }

    pub fn with_extra_metric(mut self, metric: ExtraMetric) -> Self {
        self.extra_metrics.push(metric);
        self
    }

    pub fn range(&self) -> ValueRange {
        ValueRange::new(self.min_limit, self.max_limit)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::EmptyName);
        }
        if self.telemetry_key.trim().is_empty() {
            return Err(CoreError::EmptyTelemetryKey {
                device: self.name.clone(),
            });
        }
        if !self.min_limit.is_finite()
            || !self.max_limit.is_finite()
            || self.min_limit > self.max_limit
        {
            return Err(CoreError::InvalidRange {
                device: self.name.clone(),
                min: self.min_limit,
                max: self.max_limit,
            });
        }

        match self.kind {
            DeviceKind::Continuous => {
                if !self.range().contains(self.initial_value) {
                    return Err(CoreError::InitialValueOutOfRange {
                        device: self.name.clone(),
                        value: self.initial_value,
                        min: self.min_limit,
                        max: self.max_limit,
                    });
                }
            }
            DeviceKind::Binary => {
                if !is_binary(self.initial_value) {
                    return Err(CoreError::InvalidBinaryValue {
                        device: self.name.clone(),
                        value: self.initial_value,
                    });
                }
            }
        }

        let PublishInterval {
            low_secs,
            high_secs,
        } = self.publish_interval;
        if !low_secs.is_finite() || !high_secs.is_finite() || low_secs < 0.0 || low_secs > high_secs
        {
            return Err(CoreError::InvalidInterval {
                device: self.name.clone(),
                low: low_secs,
                high: high_secs,
            });
        }

        let mut keys = HashSet::with_capacity(self.extra_metrics.len() + 1);
        keys.insert(self.telemetry_key.as_str());
        for metric in &self.extra_metrics {
            if metric.key.trim().is_empty() {
                return Err(CoreError::EmptyMetricKey {
                    device: self.name.clone(),
                });
            }
            if !keys.insert(metric.key.as_str()) {
                return Err(CoreError::DuplicateMetricKey {
                    device: self.name.clone(),
                    key: metric.key.clone(),
                });
            }
            if !metric.low.is_finite() || !metric.high.is_finite() || metric.low > metric.high {
                return Err(CoreError::InvalidMetricRange {
                    device: self.name.clone(),
                    key: metric.key.clone(),
                    low: metric.low,
                    high: metric.high,
                });
            }
        }

        Ok(())
    }
}

/// True for exactly 0 or 1
pub fn is_binary(value: f64) -> bool {
    value == 0.0 || value == 1.0
}

/// Mutable state of one device. Never shared between devices.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    last_accepted: f64,
}

impl DeviceState {
    pub fn new(initial_value: f64) -> Self {
        Self {
            last_accepted: initial_value,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.initial_value)
    }

    /// Most recent reading that passed the filter
    pub fn last_accepted(&self) -> f64 {
        self.last_accepted
    }

    pub(crate) fn accept(&mut self, value: f64) {
        self.last_accepted = value;
    }
}
