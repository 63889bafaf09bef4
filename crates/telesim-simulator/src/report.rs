//! End-of-run fleet report.

use crate::device::{DeviceExit, DeviceReport};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What woke the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShutdownTrigger {
    /// Ctrl-C / SIGTERM (or the caller's shutdown future)
    Interrupt,
    /// A device raised the stop signal after its connection was rejected
    DeviceFailure,
    /// Every device ended before any stop was requested
    AllDevicesFinished,
}

impl std::fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownTrigger::Interrupt => write!(f, "interrupt"),
            ShutdownTrigger::DeviceFailure => write!(f, "device failure"),
            ShutdownTrigger::AllDevicesFinished => write!(f, "all devices finished"),
        }
    }
}

/// Outcome of a whole simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetReport {
    pub trigger: ShutdownTrigger,
    pub devices: Vec<DeviceReport>,
    pub duration: Duration,
}

impl FleetReport {
    /// Devices are sorted by name so reports are stable across runs.
    pub fn new(trigger: ShutdownTrigger, mut devices: Vec<DeviceReport>, duration: Duration) -> Self {
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            trigger,
            devices,
            duration,
        }
    }

    pub fn total_published(&self) -> u64 {
        self.devices.iter().map(|d| d.published).sum()
    }

    pub fn total_outliers(&self) -> u64 {
        self.devices.iter().map(|d| d.outliers).sum()
    }

    pub fn failed_devices(&self) -> usize {
        self.devices.iter().filter(|d| d.exit.is_failure()).count()
    }

    pub fn device(&self, name: &str) -> Option<&DeviceReport> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Process exit code. A run that joined every device is a success,
    /// whatever made the devices stop.
    pub fn exit_code(&self) -> i32 {
        0
    }

    /// Generates a JSON report.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Generates a markdown report.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Telemetry Fleet Report\n\n");
        md.push_str("| Setting | Value |\n");
        md.push_str("|---------|-------|\n");
        md.push_str(&format!("| Devices | {} |\n", self.devices.len()));
        md.push_str(&format!("| Duration | {:.1}s |\n", self.duration.as_secs_f64()));
        md.push_str(&format!("| Shutdown | {} |\n", self.trigger));
        md.push('\n');

        md.push_str("| Device | Published | Outliers | Exit |\n");
        md.push_str("|--------|-----------|----------|------|\n");
        for device in &self.devices {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                device.name,
                device.published,
                device.outliers,
                describe_exit(&device.exit)
            ));
        }
        md.push('\n');

        md.push_str(&format!(
            "Total: {} readings published, {} outliers substituted\n",
            self.total_published(),
            self.total_outliers()
        ));

        md
    }

    /// Prints a summary to stdout.
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SIMULATION RESULTS");
        println!("{}", "=".repeat(60));

        println!(
            "\nDevices: {} | Duration: {:.1}s | Shutdown: {}",
            self.devices.len(),
            self.duration.as_secs_f64(),
            self.trigger
        );
        println!();
        for device in &self.devices {
            println!(
                "   {:<20} published={:<6} outliers={:<4} {}",
                device.name,
                device.published,
                device.outliers,
                describe_exit(&device.exit)
            );
        }

        println!(
            "\n   Total: {} published, {} outliers",
            self.total_published(),
            self.total_outliers()
        );
        if self.failed_devices() > 0 {
            println!("   Failed devices: {}", self.failed_devices());
        }

        println!("\n{}", "=".repeat(60));
    }
}

fn describe_exit(exit: &DeviceExit) -> String {
    match exit {
        DeviceExit::Stopped => "stopped".to_string(),
        DeviceExit::Rejected { code } => format!("rejected (code {})", code),
        DeviceExit::ConnectFailed(e) => format!("connect failed: {}", e),
        DeviceExit::Aborted(e) => format!("aborted: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceStatus;

    fn report(name: &str, published: u64, outliers: u64, exit: DeviceExit) -> DeviceReport {
        DeviceReport {
            name: name.to_string(),
            published,
            outliers,
            exit,
            status: DeviceStatus::Terminated,
            transitions: Vec::new(),
        }
    }

    fn sample() -> FleetReport {
        FleetReport::new(
            ShutdownTrigger::DeviceFailure,
            vec![
                report("lux", 10, 1, DeviceExit::Stopped),
                report("leak", 0, 0, DeviceExit::Rejected { code: 5 }),
                report("rack", 12, 2, DeviceExit::Stopped),
            ],
            Duration::from_secs(30),
        )
    }

    #[test]
    fn test_totals() {
        let report = sample();
        assert_eq!(report.total_published(), 22);
        assert_eq!(report.total_outliers(), 3);
        assert_eq!(report.failed_devices(), 1);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.device("leak").unwrap().published, 0);
    }

    #[test]
    fn test_devices_sorted_by_name() {
        let names: Vec<_> = sample().devices.iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["leak", "lux", "rack"]);
    }

    #[test]
    fn test_markdown_and_json() {
        let report = sample();
        let md = report.to_markdown();
        assert!(md.contains("| leak | 0 | 0 | rejected (code 5) |"));
        assert!(md.contains("| Shutdown | device failure |"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["trigger"], "device-failure");
        assert_eq!(json["devices"].as_array().unwrap().len(), 3);
    }
}
