//! Fleet-level behaviour, mostly against the in-memory transport.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use telesim_core::{DeviceConfig, PublishInterval};
use telesim_simulator::{
    default_fleet, DeviceExit, DeviceStatus, DeviceSupervisor, MemoryTransport, ShutdownTrigger,
    Transport, TransportError, TransportLog,
};

const TOPIC: &str = "v1/devices/me/telemetry";

fn sensor(name: &str, interval: PublishInterval) -> DeviceConfig {
    DeviceConfig::continuous(name, format!("{}-token", name), "value", 0.0, 100.0, 50.0)
        .with_interval(interval)
}

#[tokio::test]
async fn rejected_device_stops_the_whole_fleet() {
    let log = TransportLog::new();
    let supervisor = DeviceSupervisor::new(TOPIC, Duration::from_secs(1));
    let configs = vec![
        sensor("a", PublishInterval::fixed(0.02)),
        sensor("b", PublishInterval::fixed(0.02)),
        sensor("c", PublishInterval::fixed(0.02)),
    ];

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        supervisor.run(
            configs,
            |config| {
                let transport = MemoryTransport::new(config.name.clone(), log.clone());
                if config.name == "b" {
                    transport.with_ack(5)
                } else {
                    transport
                }
            },
            std::future::pending::<()>(),
        ),
    )
    .await
    .expect("fleet should stop after the rejection");

    assert_eq!(report.trigger, ShutdownTrigger::DeviceFailure);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.devices.len(), 3);
    assert!(report.devices.iter().all(|d| d.status == DeviceStatus::Terminated));

    let rejected = report.device("b").unwrap();
    assert_eq!(rejected.exit, DeviceExit::Rejected { code: 5 });
    assert_eq!(rejected.published, 0);
    assert!(log.payloads("b").is_empty());

    for name in ["a", "b", "c"] {
        assert_eq!(log.connects(name), 1);
        assert_eq!(log.disconnects(name), 1);
    }
}

#[tokio::test]
async fn interrupt_cuts_long_waits_short() {
    let log = TransportLog::new();
    let supervisor = DeviceSupervisor::new(TOPIC, Duration::from_secs(1));
    let configs = vec![
        sensor("slow-1", PublishInterval::fixed(30.0)),
        sensor("slow-2", PublishInterval::fixed(30.0)),
    ];

    let start = Instant::now();
    let report = tokio::time::timeout(
        Duration::from_secs(2),
        supervisor.run(
            configs,
            |config| MemoryTransport::new(config.name.clone(), log.clone()),
            tokio::time::sleep(Duration::from_millis(50)),
        ),
    )
    .await
    .expect("interrupted waits should end promptly");

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(report.trigger, ShutdownTrigger::Interrupt);
    for device in &report.devices {
        assert_eq!(device.exit, DeviceExit::Stopped);
        assert_eq!(device.published, 1);
    }
    assert_eq!(log.payloads("slow-1").len(), 1);
    assert_eq!(log.disconnects("slow-2"), 1);
}

/// Accepts the session, then never completes a publish (a saturated client queue)
struct SaturatedQueue;

#[async_trait]
impl Transport for SaturatedQueue {
    async fn connect(&mut self) -> Result<u8, TransportError> {
        Ok(0)
    }

    async fn publish(&mut self, _: &str, _: Vec<u8>) -> Result<(), TransportError> {
        std::future::pending().await
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[tokio::test]
async fn interrupt_ends_devices_stuck_in_publish() {
    let supervisor = DeviceSupervisor::new(TOPIC, Duration::from_secs(1));
    let configs = vec![
        sensor("stuck-1", PublishInterval::fixed(0.01)),
        sensor("stuck-2", PublishInterval::fixed(0.01)),
    ];

    let report = tokio::time::timeout(
        Duration::from_secs(3),
        supervisor.run(
            configs,
            |_| SaturatedQueue,
            tokio::time::sleep(Duration::from_millis(50)),
        ),
    )
    .await
    .expect("stuck publishes must not block shutdown");

    assert_eq!(report.trigger, ShutdownTrigger::Interrupt);
    assert_eq!(report.total_published(), 0);
    assert!(report
        .devices
        .iter()
        .all(|d| d.exit == DeviceExit::Stopped && d.status == DeviceStatus::Terminated));
}

#[tokio::test]
async fn fleet_ends_when_every_device_fails_on_its_own() {
    let log = TransportLog::new();
    let supervisor = DeviceSupervisor::new(TOPIC, Duration::from_secs(1));
    let configs = vec![
        sensor("x", PublishInterval::fixed(0.01)),
        sensor("y", PublishInterval::fixed(0.01)),
    ];

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        supervisor.run(
            configs,
            |config| MemoryTransport::new(config.name.clone(), log.clone()).failing_publish_after(0),
            std::future::pending::<()>(),
        ),
    )
    .await
    .expect("fleet should finish once every device has aborted");

    assert_eq!(report.trigger, ShutdownTrigger::AllDevicesFinished);
    assert_eq!(report.failed_devices(), 2);
    assert_eq!(report.total_published(), 0);
    assert!(report
        .devices
        .iter()
        .all(|d| matches!(d.exit, DeviceExit::Aborted(_))));
    assert_eq!(log.disconnects("x"), 1);
}

#[tokio::test]
async fn default_fleet_dry_run_publishes_every_key() {
    let log = TransportLog::new();
    let supervisor = DeviceSupervisor::new(TOPIC, Duration::from_secs(1));
    let configs: Vec<_> = default_fleet()
        .into_iter()
        .map(|d| d.with_interval(PublishInterval::fixed(0.01)))
        .collect();

    let report = supervisor
        .run(
            configs.clone(),
            |config| MemoryTransport::new(config.name.clone(), log.clone()),
            tokio::time::sleep(Duration::from_millis(80)),
        )
        .await;

    assert_eq!(report.trigger, ShutdownTrigger::Interrupt);
    assert_eq!(report.devices.len(), configs.len());

    for config in &configs {
        let payloads = log.payloads(&config.name);
        assert!(!payloads.is_empty(), "{} published nothing", config.name);

        let first: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
        let value = first[config.telemetry_key.as_str()]
            .as_f64()
            .unwrap_or_else(|| panic!("{} missing {}", config.name, config.telemetry_key));
        assert!(config.range().contains(value), "{} sent {}", config.name, value);
        assert_eq!(first.get("timestamp").is_some(), config.include_timestamp);
        for metric in &config.extra_metrics {
            let extra = first[metric.key.as_str()].as_f64().unwrap();
            assert!(metric.low <= extra && extra <= metric.high);
        }
    }
}
