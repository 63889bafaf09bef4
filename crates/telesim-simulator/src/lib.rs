//! Telemetry fleet simulator.
//!
//! Runs a fleet of simulated sensors concurrently. Each device connects to an
//! MQTT broker with its own credentials, then repeatedly generates a reading,
//! filters outliers, publishes a JSON payload with at-least-once delivery and
//! waits a random interval. A supervisor stops the whole fleet on Ctrl-C or
//! as soon as any device's connection is rejected.
//!
//! # Usage
//! ```bash
//! # Write the default fleet configuration
//! telesim generate-config --output telesim.yml
//!
//! # Publish to the configured broker
//! telesim run --config telesim.yml
//!
//! # Log payloads instead of publishing them
//! telesim run --dry-run --report fleet.json
//! ```

pub mod config;
pub mod device;
pub mod payload;
pub mod report;
pub mod signal;
pub mod supervisor;
pub mod transport;

pub use config::{default_fleet, ConfigError, SimulatorConfig};
pub use device::{DeviceExit, DeviceReport, DeviceStatus, SimulatedDevice};
pub use payload::TelemetryPayload;
pub use report::{FleetReport, ShutdownTrigger};
pub use signal::StopSignal;
pub use supervisor::DeviceSupervisor;
pub use transport::{MemoryTransport, MqttTransport, Transport, TransportError, TransportLog};
