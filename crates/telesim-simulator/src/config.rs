//! Configuration structs for the fleet simulator.
//!
//! Loaded from YAML (`telesim.yml` by default). Every section has defaults,
//! so a partial file only needs to override what differs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use telesim_core::{CoreError, DeviceConfig, ExtraMetric, PublishInterval};
use thiserror::Error;
use tracing::Level;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid device: {0}")]
    Device(#[from] CoreError),

    #[error("No devices configured")]
    NoDevices,

    #[error("Duplicate device name: {0}")]
    DuplicateDevice(String),

    #[error("Empty telemetry topic")]
    EmptyTopic,

    #[error("Keep-alive must be 0 (disabled) or at least 5 seconds, got {0}")]
    InvalidKeepAlive(u64),
}

/// Complete simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Broker connection settings
    pub broker: BrokerSettings,
    /// Telemetry publishing settings
    pub telemetry: TelemetrySettings,
    /// Logging configuration
    pub logging: LoggingSettings,
    /// The simulated fleet
    pub devices: Vec<DeviceConfig>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            broker: BrokerSettings::default(),
            telemetry: TelemetrySettings::default(),
            logging: LoggingSettings::default(),
            devices: default_fleet(),
        }
    }
}

/// Broker connection settings, shared by every device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    /// Client id is this prefix followed by the device name
    pub client_id_prefix: String,
    /// Upper bound on waiting for the connection acknowledgement
    pub connect_timeout_secs: u64,
    /// Upper bound on releasing a connection during shutdown
    pub teardown_timeout_secs: u64,
    /// Request channel capacity of each MQTT client
    pub channel_capacity: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "mqtt.thingsboard.cloud".to_string(),
            port: 1883,
            keep_alive_secs: 60,
            client_id_prefix: "Client-".to_string(),
            connect_timeout_secs: 10,
            teardown_timeout_secs: 5,
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Topic every device publishes to
    pub topic: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            topic: "v1/devices/me/telemetry".to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Include target in logs
    pub show_target: bool,
    /// Include thread IDs in logs
    pub show_thread_ids: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: false,
            show_thread_ids: false,
        }
    }
}

impl SimulatorConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Write default config to a file
    pub fn write_default(path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(&Self::default())?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Checks the fleet and broker settings before anything connects
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        if self.telemetry.topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        let keep_alive = self.broker.keep_alive_secs;
        if keep_alive != 0 && keep_alive < 5 {
            return Err(ConfigError::InvalidKeepAlive(keep_alive));
        }

        let mut names = HashSet::with_capacity(self.devices.len());
        for device in &self.devices {
            device.validate()?;
            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::DuplicateDevice(device.name.clone()));
            }
        }
        Ok(())
    }

    /// Get log level
    pub fn log_level(&self) -> Level {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// The data-center fleet: four environmental sensors, a leak detector and an
/// ambient probe reporting temperature with unfiltered humidity.
///
/// Tokens are placeholders; replace them with real device credentials.
pub fn default_fleet() -> Vec<DeviceConfig> {
    vec![
        DeviceConfig::continuous(
            "ServidorPrincipal",
            "SERVIDOR_PRINCIPAL_TOKEN",
            "temp_rack",
            15.0,
            40.0,
            25.0,
        ),
        DeviceConfig::continuous("EntradaAr", "ENTRADA_AR_TOKEN", "umidade_ar", 40.0, 80.0, 60.0),
        DeviceConfig::continuous(
            "Estabilizador",
            "ESTABILIZADOR_TOKEN",
            "vibracao_fan",
            10.0,
            800.0,
            300.0,
        ),
        DeviceConfig::continuous("Iluminacao", "ILUMINACAO_TOKEN", "lux", 50.0, 900.0, 500.0),
        DeviceConfig::binary("DetectorVazamento", "DETECTOR_VAZAMENTO_TOKEN", "vazamento")
            .with_interval(PublishInterval::new(4.0, 7.0))
            .with_timestamp(true),
        DeviceConfig::continuous(
            "SensorAmbiente",
            "SENSOR_AMBIENTE_TOKEN",
            "temperatura",
            15.0,
            40.0,
            25.0,
        )
        .with_extra_metric(ExtraMetric::new("umidade", 50.0, 70.0))
        .with_interval(PublishInterval::fixed(5.0))
        .with_timestamp(true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use telesim_core::DeviceKind;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimulatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.devices.len(), 6);
        assert_eq!(
            config.devices.iter().filter(|d| !d.extra_metrics.is_empty()).count(),
            1
        );
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.telemetry.topic, "v1/devices/me/telemetry");
        assert_eq!(
            config.devices.iter().filter(|d| d.kind == DeviceKind::Binary).count(),
            1
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
broker:
  host: localhost
devices:
  - name: rack
    access_token: abc
    telemetry_key: temp_rack
    min_limit: 15.0
    max_limit: 40.0
    initial_value: 25.0
    publish_interval:
      low_secs: 1.0
      high_secs: 2.0
  - name: leak
    access_token: def
    telemetry_key: leak
    min_limit: 0.0
    max_limit: 1.0
    initial_value: 0.0
    kind: binary
    include_timestamp: true
"#;
        let config = SimulatorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].publish_interval, PublishInterval::new(1.0, 2.0));
        assert_eq!(config.devices[1].kind, DeviceKind::Binary);
        assert!(config.devices[1].include_timestamp);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_extra_metrics_from_yaml() {
        let yaml = r#"
devices:
  - name: ambiente
    access_token: abc
    telemetry_key: temperatura
    min_limit: 15.0
    max_limit: 40.0
    initial_value: 25.0
    include_timestamp: true
    extra_metrics:
      - key: umidade
        low: 50.0
        high: 70.0
"#;
        let config = SimulatorConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.devices[0].extra_metrics,
            vec![ExtraMetric::new("umidade", 50.0, 70.0)]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let mut config = SimulatorConfig::default();
        let copy = config.devices[0].clone();
        config.devices.push(copy);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateDevice(name)) if name == "ServidorPrincipal"
        ));
    }

    #[test]
    fn test_rejects_empty_fleet_and_bad_device() {
        let mut config = SimulatorConfig::default();
        config.devices[1].initial_value = 95.0;
        assert!(matches!(config.validate(), Err(ConfigError::Device(_))));

        config.devices.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoDevices)));
    }

    #[test]
    fn test_rejects_short_keep_alive() {
        let mut config = SimulatorConfig::default();
        config.broker.keep_alive_secs = 2;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidKeepAlive(2))));
    }

    #[test]
    fn test_write_and_load_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telesim.yml");

        SimulatorConfig::write_default(&path).unwrap();
        let loaded = SimulatorConfig::from_file(&path).unwrap();
        assert_eq!(loaded.devices, default_fleet());
        assert_eq!(loaded.broker.host, "mqtt.thingsboard.cloud");
    }

    #[test]
    fn test_log_level() {
        let mut config = SimulatorConfig::default();
        assert_eq!(config.log_level(), Level::INFO);
        config.logging.level = "DEBUG".to_string();
        assert_eq!(config.log_level(), Level::DEBUG);
    }
}
