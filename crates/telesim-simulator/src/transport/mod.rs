//! Broker session capability used by every simulated device.
//!
//! A device only needs three things from its transport: establish a session
//! (returning the broker's acknowledgement code), send a message, and tear the
//! session down. [`MqttTransport`] talks to a real broker; [`MemoryTransport`]
//! keeps everything in-process for dry runs and tests.

mod memory;
mod mqtt;

pub use memory::{MemoryTransport, TransportEvent, TransportLog};
pub use mqtt::MqttTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Acknowledgement code of an accepted session
pub const ACK_ACCEPTED: u8 = 0;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Timed out waiting for connection acknowledgement")]
    ConnectTimeout,

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Disconnect failed: {0}")]
    Disconnect(String),

    #[error("Not connected")]
    NotConnected,
}

/// Session with the telemetry broker
#[async_trait]
pub trait Transport: Send {
    /// Opens the session and returns the broker's acknowledgement code.
    ///
    /// `Ok` with a non-zero code means the broker answered but refused the
    /// session; `Err` means no answer could be obtained at all.
    async fn connect(&mut self) -> Result<u8, TransportError>;

    /// Sends one payload with at-least-once delivery.
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Stops background delivery and closes the session.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn connect(&mut self) -> Result<u8, TransportError> {
        (**self).connect().await
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        (**self).publish(topic, payload).await
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        (**self).disconnect().await
    }
}

/// Human-readable meaning of an MQTT 3.1.1 CONNACK return code
pub fn describe_ack(code: u8) -> &'static str {
    match code {
        0 => "accepted",
        1 => "unacceptable protocol version",
        2 => "identifier rejected",
        3 => "server unavailable",
        4 => "bad user name or password",
        5 => "not authorized",
        _ => "unknown return code",
    }
}
