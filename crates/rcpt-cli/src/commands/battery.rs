//! Battery command - sample the fuel gauge and shut down on low charge.

use std::time::Duration;

use chrono::Utc;
use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;
use tracing::{info, warn};

use rcpt_core::battery::{
    BatteryController, ChargeModel, DiscoveringFuelGauge, FuelGauge, HwmonFuelGauge, JsonLinesLog,
    ShutdownCommand, Thresholds,
};
use rcpt_core::error::ShutdownError;
use rcpt_core::models::config::BatteryConfig;

use super::load_config;

/// Arguments for the battery command.
#[derive(Args)]
pub struct BatteryArgs {
    #[command(subcommand)]
    command: BatteryCommand,
}

#[derive(Subcommand)]
enum BatteryCommand {
    /// Sample until shutdown or Ctrl-C
    Run {
        /// Seconds between samples (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Log instead of running the shutdown command
        #[arg(long)]
        dry_run: bool,
    },

    /// Take a single reading
    Read {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Shutdown stand-in for `--dry-run`.
struct LogOnlyShutdown {
    argv: Vec<String>,
}

impl ShutdownCommand for LogOnlyShutdown {
    fn issue(&mut self) -> Result<(), ShutdownError> {
        warn!("Dry run: would run {:?}", self.argv);
        Ok(())
    }
}

#[derive(Serialize)]
struct Reading {
    volts: f32,
    amps: f32,
    percentage: f32,
}

pub async fn run(args: BatteryArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    match args.command {
        BatteryCommand::Run { interval, dry_run } => run_loop(&config.battery, interval, dry_run).await,
        BatteryCommand::Read { json } => read_once(&config.battery, json),
    }
}

async fn run_loop(config: &BatteryConfig, interval: Option<u64>, dry_run: bool) -> anyhow::Result<()> {
    let controller = if dry_run {
        BatteryController::new(
            Box::new(DiscoveringFuelGauge::new(&config.hwmon_root, config.chip_name.as_str())),
            Box::new(LogOnlyShutdown {
                argv: config.shutdown_command.clone(),
            }),
            Box::new(JsonLinesLog::new(&config.log_path)),
            ChargeModel::from_config(config)?,
            Thresholds::from_config(config),
        )
    } else {
        if config.shutdown_command.is_empty() {
            anyhow::bail!("battery.shutdown_command is empty");
        }
        BatteryController::from_config(config)?
    };

    let period = Duration::from_secs(interval.unwrap_or(config.poll_interval_secs).max(1));
    info!("Logging battery readings to {}", config.log_path.display());

    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let state = controller.run(period, stop).await;
    eprintln!("{} Battery monitor stopped in state {}", style("ℹ").blue(), state);

    Ok(())
}

fn read_once(config: &BatteryConfig, json: bool) -> anyhow::Result<()> {
    let mut gauge = HwmonFuelGauge::discover(&config.hwmon_root, &config.chip_name)?;
    let model = ChargeModel::from_config(config)?;

    let sample = gauge.read()?;
    let reading = Reading {
        volts: sample.volts,
        amps: sample.amps,
        percentage: model.percentage(sample.volts),
    };

    if json {
        println!("{}", serde_json::to_string(&reading)?);
        return Ok(());
    }

    let pct = if reading.percentage < config.shutdown_threshold {
        style(format!("{:.1}%", reading.percentage)).red()
    } else if reading.percentage < config.warning_threshold {
        style(format!("{:.1}%", reading.percentage)).yellow()
    } else {
        style(format!("{:.1}%", reading.percentage)).green()
    };

    println!("Time:    {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Voltage: {:.3} V", reading.volts);
    println!("Current: {:.3} A", reading.amps);
    println!("Charge:  {}", pct);

    Ok(())
}
