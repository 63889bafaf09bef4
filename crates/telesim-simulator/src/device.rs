//! A single simulated device: connect, then generate → filter → publish → wait
//! until the fleet stop signal is raised, then release the connection. Both the
//! wait and a pending publish end as soon as the signal is raised.

use crate::payload::{now_millis, TelemetryPayload};
use crate::signal::StopSignal;
use crate::transport::{describe_ack, Transport, TransportError, ACK_ACCEPTED};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use telesim_core::{
    DeviceConfig, DeviceState, OutlierFilter, RandomSource, ReadingGenerator, StdRandom,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default upper bound on releasing a connection
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Device loop panicked: {0}")]
    Panic(String),
}

/// Lifecycle of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Disconnected,
    Connected,
    Running,
    Stopping,
    Terminated,
    /// Broker refused the session
    Failed,
}

/// Why a device stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceExit {
    /// Observed the stop signal
    Stopped,
    /// Broker answered the handshake with a non-zero code
    Rejected { code: u8 },
    /// No acknowledgement could be obtained
    ConnectFailed(String),
    /// Unexpected error inside the publish loop
    Aborted(String),
}

impl DeviceExit {
    pub fn is_failure(&self) -> bool {
        !matches!(self, DeviceExit::Stopped)
    }
}

/// What a device did during its run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceReport {
    pub name: String,
    pub published: u64,
    pub outliers: u64,
    pub exit: DeviceExit,
    pub status: DeviceStatus,
    /// Every status the device went through, in order
    pub transitions: Vec<DeviceStatus>,
}

/// One device of the fleet. Owns its state, randomness and connection.
pub struct SimulatedDevice<T> {
    config: DeviceConfig,
    state: DeviceState,
    generator: ReadingGenerator,
    filter: OutlierFilter,
    rng: Box<dyn RandomSource>,
    transport: T,
    topic: Arc<str>,
    stop: StopSignal,
    teardown_timeout: Duration,
    status: DeviceStatus,
    transitions: Vec<DeviceStatus>,
    published: u64,
    outliers: u64,
}

impl<T: Transport> SimulatedDevice<T> {
    pub fn new(config: DeviceConfig, transport: T, topic: Arc<str>, stop: StopSignal) -> Self {
        Self {
            state: DeviceState::from_config(&config),
            generator: ReadingGenerator::from_config(&config),
            filter: OutlierFilter::from_config(&config),
            rng: Box::new(StdRandom::from_entropy()),
            config,
            transport,
            topic,
            stop,
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
            status: DeviceStatus::Disconnected,
            transitions: vec![DeviceStatus::Disconnected],
            published: 0,
            outliers: 0,
        }
    }

    /// Replace the entropy-backed randomness
    pub fn with_random(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Runs the whole lifecycle. The connection is released on every exit path.
    pub async fn run(mut self) -> DeviceReport {
        let exit = match self.transport.connect().await {
            Ok(ACK_ACCEPTED) => {
                self.transition(DeviceStatus::Connected);
                info!("[{}] Connected", self.config.name);
                self.transition(DeviceStatus::Running);

                let result = AssertUnwindSafe(self.publish_loop())
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(DeviceError::Panic(panic_message(panic))));

                match result {
                    Ok(()) => DeviceExit::Stopped,
                    Err(e) => {
                        error!("[{}] Unexpected error: {}", self.config.name, e);
                        DeviceExit::Aborted(e.to_string())
                    }
                }
            }
            Ok(code) => {
                error!(
                    "[{}] Connection rejected with code {} ({}), stopping the fleet",
                    self.config.name,
                    code,
                    describe_ack(code)
                );
                self.transition(DeviceStatus::Failed);
                self.stop.trigger();
                DeviceExit::Rejected { code }
            }
            Err(e) => {
                error!("[{}] Connection failed: {}", self.config.name, e);
                DeviceExit::ConnectFailed(e.to_string())
            }
        };

        if self.status != DeviceStatus::Failed {
            self.transition(DeviceStatus::Stopping);
        }
        self.release().await;
        self.transition(DeviceStatus::Terminated);
        info!("[{}] Terminated and disconnected", self.config.name);

        DeviceReport {
            name: self.config.name,
            published: self.published,
            outliers: self.outliers,
            exit,
            status: self.status,
            transitions: self.transitions,
        }
    }

    async fn publish_loop(&mut self) -> Result<(), DeviceError> {
        while !self.stop.is_set() {
            self.tick().await?;

            let wait = self.config.publish_interval.sample(self.rng.as_mut());
            if self.stop.wait_timeout(wait).await {
                debug!("[{}] Stop signal observed", self.config.name);
                break;
            }
        }
        Ok(())
    }

    /// One generate → filter → publish step
    async fn tick(&mut self) -> Result<(), DeviceError> {
        let raw = self.generator.generate(&self.state, self.rng.as_mut());
        let outcome = self.filter.apply(raw, &mut self.state);
        if outcome.was_outlier {
            self.outliers += 1;
        }

        let timestamp = self.config.include_timestamp.then(now_millis);
        let mut payload = TelemetryPayload::new(
            &self.config.telemetry_key,
            outcome.value,
            self.config.kind,
            timestamp,
        );
        for (key, value) in self.generator.generate_extras(self.rng.as_mut()) {
            payload = payload.with_field(&key, value);
        }
        let bytes = payload.to_bytes()?;

        // a publish can block while the client's request queue is full
        tokio::select! {
            biased;
            result = self.transport.publish(&self.topic, bytes) => result?,
            _ = self.stop.cancelled() => {
                warn!("[{}] Stop signal raised during publish, dropping reading", self.config.name);
                return Ok(());
            }
        }
        self.published += 1;
        debug!("[{}] Published {}", self.config.name, payload.to_json());
        Ok(())
    }

    async fn release(&mut self) {
        match tokio::time::timeout(self.teardown_timeout, self.transport.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[{}] Disconnect error: {}", self.config.name, e),
            Err(_) => warn!(
                "[{}] Disconnect did not finish within {:?}, abandoning it",
                self.config.name, self.teardown_timeout
            ),
        }
    }

    fn transition(&mut self, status: DeviceStatus) {
        self.status = status;
        self.transitions.push(status);
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
