//! CLI entry point for the telemetry fleet simulator.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use telesim_core::DeviceConfig;
use telesim_simulator::{
    DeviceSupervisor, MemoryTransport, MqttTransport, SimulatorConfig, Transport, TransportLog,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_CONFIG: &str = "telesim.yml";

#[derive(Parser)]
#[command(name = "telesim")]
#[command(about = "Concurrent IoT sensor fleet simulator publishing telemetry over MQTT")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fleet until Ctrl-C or a rejected connection
    Run {
        /// Configuration file (defaults are used when it does not exist)
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Broker host
        #[arg(long)]
        host: Option<String>,

        /// Broker port
        #[arg(short, long)]
        port: Option<u16>,

        /// Telemetry topic
        #[arg(short, long)]
        topic: Option<String>,

        /// Log payloads instead of publishing them
        #[arg(long)]
        dry_run: bool,

        /// Output file for the fleet report (markdown for .md, JSON otherwise)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Write the default configuration file
    GenerateConfig {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::GenerateConfig { output } => {
            SimulatorConfig::write_default(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Generated default configuration: {}", output.display());
            Ok(())
        }
        Commands::Run {
            config,
            host,
            port,
            topic,
            dry_run,
            report,
        } => {
            let mut config = load_config(&config)?;
            if let Some(host) = host {
                config.broker.host = host;
            }
            if let Some(port) = port {
                config.broker.port = port;
            }
            if let Some(topic) = topic {
                config.telemetry.topic = topic;
            }
            config.validate().context("invalid configuration")?;

            init_logging(&config)?;
            let code = run(config, dry_run, report.as_deref()).await?;
            std::process::exit(code);
        }
    }
}

fn load_config(path: &Path) -> Result<SimulatorConfig> {
    if path.exists() {
        SimulatorConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
    } else {
        Ok(SimulatorConfig::default())
    }
}

fn init_logging(config: &SimulatorConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level().as_str()))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(config.logging.show_target)
                .with_thread_ids(config.logging.show_thread_ids),
        )
        .with(filter)
        .init();
    Ok(())
}

async fn run(config: SimulatorConfig, dry_run: bool, report_path: Option<&Path>) -> Result<i32> {
    if dry_run {
        info!("Dry run: payloads are logged, nothing is sent");
    } else {
        info!(
            "Publishing to {}:{} on topic {}",
            config.broker.host, config.broker.port, config.telemetry.topic
        );
    }

    let supervisor = DeviceSupervisor::new(
        config.telemetry.topic.clone(),
        Duration::from_secs(config.broker.teardown_timeout_secs),
    );

    let log = TransportLog::new();
    let broker = config.broker.clone();
    let connect = |device: &DeviceConfig| -> Box<dyn Transport> {
        if dry_run {
            Box::new(MemoryTransport::new(device.name.clone(), log.clone()).echo(true))
        } else {
            Box::new(MqttTransport::new(device, &broker))
        }
    };

    let report = supervisor
        .run(config.devices, connect, shutdown_signal())
        .await;

    report.print_summary();
    info!("All simulations finished");

    if let Some(path) = report_path {
        let content = if path.extension().is_some_and(|ext| ext == "md") {
            report.to_markdown()
        } else {
            report.to_json()
        };
        std::fs::write(path, content)
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(report.exit_code())
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, stopping all devices..."),
        _ = terminate => info!("SIGTERM received, stopping all devices..."),
    }
}
