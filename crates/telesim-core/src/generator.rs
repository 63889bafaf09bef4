//! Synthetic reading generator with injected sensor glitches.

use crate::random::RandomSource;
use crate::filter::round2;
use crate::types::{DeviceConfig, DeviceKind, DeviceState, ExtraMetric, ValueRange};

/// Maximum drift of a continuous reading per tick, in either direction
pub const DRIFT: f64 = 1.0;

/// Probability that a continuous reading is replaced by an out-of-range glitch
pub const GLITCH_PROBABILITY: f64 = 0.05;

/// Glitches land between these offsets beyond the violated limit
pub const GLITCH_NEAR_OFFSET: f64 = 5.0;
pub const GLITCH_FAR_OFFSET: f64 = 10.0;

/// Probability that a binary detector reports 0 (nothing detected)
pub const BINARY_IDLE_PROBABILITY: f64 = 0.98;

/// Probability that a binary detector emits a malfunction code
pub const BINARY_MALFUNCTION_PROBABILITY: f64 = 0.01;

/// Codes a malfunctioning binary detector may emit
pub const INVALID_BINARY_CODES: [f64; 3] = [2.0, -1.0, 99.0];

/// Produces one raw reading per tick. Reads the device state, never mutates it.
#[derive(Debug, Clone)]
pub struct ReadingGenerator {
    kind: DeviceKind,
    range: ValueRange,
    extras: Vec<ExtraMetric>,
}

impl ReadingGenerator {
    pub fn new(kind: DeviceKind, range: ValueRange) -> Self {
        Self {
            kind,
            range,
            extras: Vec::new(),
        }
    }

    pub fn with_extras(mut self, extras: Vec<ExtraMetric>) -> Self {
        self.extras = extras;
        self
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.kind, config.range()).with_extras(config.extra_metrics.clone())
    }

    pub fn generate(&self, state: &DeviceState, rng: &mut dyn RandomSource) -> f64 {
        match self.kind {
            DeviceKind::Continuous => self.continuous(state, rng),
            DeviceKind::Binary => binary(rng),
        }
    }

    /// One rounded draw per extra metric, in configuration order.
    /// Drawn after the main reading of the same tick.
    pub fn generate_extras(&self, rng: &mut dyn RandomSource) -> Vec<(String, f64)> {
        self.extras
            .iter()
            .map(|metric| (metric.key.clone(), round2(rng.uniform(metric.low, metric.high))))
            .collect()
    }

    fn continuous(&self, state: &DeviceState, rng: &mut dyn RandomSource) -> f64 {
        let raw = state.last_accepted() + rng.uniform(-DRIFT, DRIFT);

        if !rng.chance(GLITCH_PROBABILITY) {
            return raw;
        }

        if rng.chance(0.5) {
            rng.uniform(
                self.range.max + GLITCH_NEAR_OFFSET,
                self.range.max + GLITCH_FAR_OFFSET,
            )
        } else {
            rng.uniform(
                self.range.min - GLITCH_FAR_OFFSET,
                self.range.min - GLITCH_NEAR_OFFSET,
            )
        }
    }
}

fn binary(rng: &mut dyn RandomSource) -> f64 {
    let raw = if rng.chance(BINARY_IDLE_PROBABILITY) {
        0.0
    } else {
        1.0
    };

    if rng.chance(BINARY_MALFUNCTION_PROBABILITY) {
        INVALID_BINARY_CODES[rng.index(INVALID_BINARY_CODES.len())]
    } else {
        raw
    }
}
