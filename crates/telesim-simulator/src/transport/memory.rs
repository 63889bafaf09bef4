//! In-process transport: records every session event instead of sending it.

use super::{Transport, TransportError, ACK_ACCEPTED};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One recorded session event
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connect { device: String, ack: u8 },
    Publish {
        device: String,
        topic: String,
        payload: String,
    },
    Disconnect { device: String },
}

/// Shared, append-only record of transport events across a fleet
#[derive(Debug, Clone, Default)]
pub struct TransportLog {
    events: Arc<Mutex<Vec<TransportEvent>>>,
}

impl TransportLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: TransportEvent) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().clone()
    }

    /// Payloads published by `device`, in order
    pub fn payloads(&self, device: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TransportEvent::Publish {
                    device: d, payload, ..
                } if d == device => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connects(&self, device: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, TransportEvent::Connect { device: d, .. } if d == device))
            .count()
    }

    pub fn disconnects(&self, device: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, TransportEvent::Disconnect { device: d } if d == device))
            .count()
    }
}

/// Transport that never leaves the process
pub struct MemoryTransport {
    device: String,
    log: TransportLog,
    ack: u8,
    fail_publish_after: Option<u64>,
    disconnect_delay: Option<Duration>,
    echo: bool,
    connected: bool,
    published: u64,
}

impl MemoryTransport {
    pub fn new(device: impl Into<String>, log: TransportLog) -> Self {
        Self {
            device: device.into(),
            log,
            ack: ACK_ACCEPTED,
            fail_publish_after: None,
            disconnect_delay: None,
            echo: false,
            connected: false,
            published: 0,
        }
    }

    /// Acknowledgement code returned by `connect`
    pub fn with_ack(mut self, ack: u8) -> Self {
        self.ack = ack;
        self
    }

    /// Fail every publish after the first `count` succeed
    pub fn failing_publish_after(mut self, count: u64) -> Self {
        self.fail_publish_after = Some(count);
        self
    }

    /// Make `disconnect` take this long
    pub fn with_disconnect_delay(mut self, delay: Duration) -> Self {
        self.disconnect_delay = Some(delay);
        self
    }

    /// Log every payload at INFO (dry-run mode)
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&mut self) -> Result<u8, TransportError> {
        self.log.record(TransportEvent::Connect {
            device: self.device.clone(),
            ack: self.ack,
        });
        self.connected = self.ack == ACK_ACCEPTED;
        Ok(self.ack)
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(limit) = self.fail_publish_after {
            if self.published >= limit {
                return Err(TransportError::Publish("simulated publish failure".to_string()));
            }
        }

        let payload = String::from_utf8_lossy(&payload).into_owned();
        if self.echo {
            info!("[{}] {} <- {}", self.device, topic, payload);
        }
        self.log.record(TransportEvent::Publish {
            device: self.device.clone(),
            topic: topic.to_string(),
            payload,
        });
        self.published += 1;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(delay) = self.disconnect_delay {
            tokio::time::sleep(delay).await;
        }
        self.connected = false;
        self.log.record(TransportEvent::Disconnect {
            device: self.device.clone(),
        });
        Ok(())
    }
}
