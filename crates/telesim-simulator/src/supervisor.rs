//! Fleet orchestration.
//!
//! Starts every device as its own task, waits for an interrupt or for a device
//! to raise the stop signal, then broadcasts the stop and joins all devices.

use crate::device::{DeviceExit, DeviceReport, DeviceStatus, SimulatedDevice};
use crate::report::{FleetReport, ShutdownTrigger};
use crate::signal::StopSignal;
use crate::transport::Transport;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telesim_core::DeviceConfig;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

/// Owns the fleet-wide stop signal and runs devices to completion.
///
/// The stop signal is never cleared, so a supervisor runs one fleet once.
pub struct DeviceSupervisor {
    topic: Arc<str>,
    stop: StopSignal,
    teardown_timeout: Duration,
}

impl DeviceSupervisor {
    pub fn new(topic: impl Into<String>, teardown_timeout: Duration) -> Self {
        Self {
            topic: Arc::from(topic.into()),
            stop: StopSignal::new(),
            teardown_timeout,
        }
    }

    /// The signal every device of this supervisor observes
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Builds a device wired to this supervisor's topic and stop signal
    pub fn device<T: Transport>(&self, config: DeviceConfig, transport: T) -> SimulatedDevice<T> {
        SimulatedDevice::new(config, transport, Arc::clone(&self.topic), self.stop.clone())
            .with_teardown_timeout(self.teardown_timeout)
    }

    /// Runs one device per config, each with its own transport from `connect`.
    pub async fn run<T, F, S>(
        &self,
        configs: Vec<DeviceConfig>,
        mut connect: F,
        shutdown: S,
    ) -> FleetReport
    where
        T: Transport + 'static,
        F: FnMut(&DeviceConfig) -> T,
        S: Future<Output = ()>,
    {
        let devices = configs
            .into_iter()
            .map(|config| {
                let transport = connect(&config);
                self.device(config, transport)
            })
            .collect();
        self.run_devices(devices, shutdown).await
    }

    /// Runs prepared devices until `shutdown` resolves, a device raises the
    /// stop signal, or every device has finished on its own.
    pub async fn run_devices<T, S>(
        &self,
        devices: Vec<SimulatedDevice<T>>,
        shutdown: S,
    ) -> FleetReport
    where
        T: Transport + 'static,
        S: Future<Output = ()>,
    {
        let start = Instant::now();
        info!("Starting simulation of {} devices", devices.len());

        let mut tasks = JoinSet::new();
        for device in devices {
            tasks.spawn(device.run());
        }

        let mut reports = Vec::new();
        tokio::pin!(shutdown);

        let trigger = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Interrupt received, signalling devices to stop");
                    break ShutdownTrigger::Interrupt;
                }
                _ = self.stop.cancelled() => {
                    warn!("Stop signal raised by a device, shutting down the fleet");
                    break ShutdownTrigger::DeviceFailure;
                }
                joined = tasks.join_next() => match joined {
                    Some(result) => collect(result, &mut reports),
                    None => {
                        info!("All devices finished on their own");
                        break ShutdownTrigger::AllDevicesFinished;
                    }
                },
            }
        };

        self.stop.trigger();
        while let Some(result) = tasks.join_next().await {
            collect(result, &mut reports);
        }

        FleetReport::new(trigger, reports, start.elapsed())
    }
}

fn collect(result: Result<DeviceReport, JoinError>, reports: &mut Vec<DeviceReport>) {
    match result {
        Ok(report) => reports.push(report),
        Err(e) => {
            // device.run() contains its own panics, so this is a cancelled or aborted task
            error!("Device task failed: {}", e);
            reports.push(DeviceReport {
                name: "<unknown>".to_string(),
                published: 0,
                outliers: 0,
                exit: DeviceExit::Aborted(e.to_string()),
                status: DeviceStatus::Terminated,
                transitions: Vec::new(),
            });
        }
    }
}
