//! Telemetry payload encoding.
//!
//! `{"<telemetry_key>": <value>}`, optionally with extra metric fields and
//! `"timestamp": <epoch millis>`.

use serde_json::{Map, Number, Value};
use telesim_core::DeviceKind;

/// Field name of the optional timestamp
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// A single-metric telemetry message
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPayload {
    fields: Map<String, Value>,
}

impl TelemetryPayload {
    /// Binary readings go out as JSON integers, continuous ones as floats.
    pub fn new(key: &str, value: f64, kind: DeviceKind, timestamp_ms: Option<i64>) -> Self {
        let value = match kind {
            DeviceKind::Binary => Value::from(value as i64),
            DeviceKind::Continuous => Number::from_f64(value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        };

        let mut fields = Map::new();
        fields.insert(key.to_string(), value);
        if let Some(ts) = timestamp_ms {
            fields.insert(TIMESTAMP_FIELD.to_string(), Value::from(ts));
        }

        Self { fields }
    }

    /// Adds a secondary float field. The primary reading keeps its key.
    pub fn with_field(mut self, key: &str, value: f64) -> Self {
        if let Some(number) = Number::from_f64(value) {
            self.fields
                .entry(key.to_string())
                .or_insert(Value::Number(number));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.fields)
    }
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
