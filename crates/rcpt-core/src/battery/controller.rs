//! Sampling loop tying gauge, state machine, log and shutdown together.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::{RcptError, SensorError};
use crate::models::config::BatteryConfig;

use super::charge::ChargeModel;
use super::gauge::{DiscoveringFuelGauge, FuelGauge, GaugeSample};
use super::log::{JsonLinesLog, ReadingLog, ReadingRecord};
use super::shutdown::{CommandShutdown, ShutdownCommand};
use super::state::{Action, BatteryMonitor, BatteryState, Thresholds};

/// What one tick observed.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub sample: Option<GaugeSample>,
    pub percentage: Option<f32>,
    pub state: BatteryState,
    pub action: Option<Action>,
}

/// Battery controller. Starts in [`BatteryState::Sampling`] and issues the
/// shutdown command at most once over its lifetime.
pub struct BatteryController {
    gauge: Box<dyn FuelGauge>,
    shutdown: Box<dyn ShutdownCommand>,
    log: Box<dyn ReadingLog>,
    model: ChargeModel,
    monitor: BatteryMonitor,
}

impl BatteryController {
    pub fn new(
        gauge: Box<dyn FuelGauge>,
        shutdown: Box<dyn ShutdownCommand>,
        log: Box<dyn ReadingLog>,
        model: ChargeModel,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            gauge,
            shutdown,
            log,
            model,
            monitor: BatteryMonitor::new(thresholds),
        }
    }

    /// Controller on the hwmon gauge, command shutdown and JSON lines log.
    ///
    /// A missing fuel gauge is not an error here; each tick looks for it and
    /// logs a sensor failure until it appears.
    pub fn from_config(config: &BatteryConfig) -> Result<Self, RcptError> {
        Ok(Self::new(
            Box::new(DiscoveringFuelGauge::new(&config.hwmon_root, config.chip_name.as_str())),
            Box::new(CommandShutdown::new(config.shutdown_command.clone())),
            Box::new(JsonLinesLog::new(&config.log_path)),
            ChargeModel::from_config(config)?,
            Thresholds::from_config(config),
        ))
    }

    pub fn state(&self) -> BatteryState {
        self.monitor.state()
    }

    pub fn charge_model(&self) -> &ChargeModel {
        &self.model
    }

    /// Take one sample and advance the state machine.
    ///
    /// In ShutdownPending or Shutdown nothing is read or logged.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        if self.monitor.state().is_terminal() {
            return TickReport {
                sample: None,
                percentage: None,
                state: self.monitor.state(),
                action: None,
            };
        }

        let report = match self.gauge.read() {
            Ok(sample) => self.observe(sample),
            Err(e) => self.sensor_failed(now, e),
        };

        if report.sample.is_some() {
            self.append(ReadingRecord {
                timestamp: now,
                volts: report.sample.map(|s| s.volts),
                amps: report.sample.map(|s| s.amps),
                percentage: report.percentage,
                state: report.state,
                error: None,
            });
        }

        report
    }

    fn observe(&mut self, sample: GaugeSample) -> TickReport {
        let percentage = self.model.percentage(sample.volts);
        let action = self.monitor.observe(percentage);

        info!(
            volts = sample.volts,
            amps = sample.amps,
            percentage,
            state = %self.monitor.state(),
            "battery reading"
        );

        match action {
            Some(Action::Warn) => warn!("Battery low: {:.1}%", percentage),
            Some(Action::Recovered) => info!("Battery recovered: {:.1}%", percentage),
            Some(Action::IssueShutdown) => {
                warn!("Battery critical: {:.1}%, shutting down", percentage);
                if let Err(e) = self.shutdown.issue() {
                    error!("{}", e);
                }
                self.monitor.mark_shutdown();
            }
            None => {}
        }

        TickReport {
            sample: Some(sample),
            percentage: Some(percentage),
            state: self.monitor.state(),
            action,
        }
    }

    fn sensor_failed(&mut self, now: DateTime<Utc>, e: SensorError) -> TickReport {
        warn!("Battery read failed: {}", e);
        self.monitor.sensor_failed();

        self.append(ReadingRecord {
            timestamp: now,
            volts: None,
            amps: None,
            percentage: None,
            state: self.monitor.state(),
            error: Some(e.to_string()),
        });

        TickReport {
            sample: None,
            percentage: None,
            state: self.monitor.state(),
            action: None,
        }
    }

    fn append(&mut self, record: ReadingRecord) {
        if let Err(e) = self.log.append(&record) {
            warn!("Failed to write battery log: {}", e);
        }
    }

    /// Tick every `period` until shut down or `stop` resolves.
    ///
    /// Returns the final state.
    pub async fn run<F>(mut self, period: Duration, stop: F) -> BatteryState
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(stop);

        info!("Battery monitor started, sampling every {:?}", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick(Utc::now());
                    debug!("tick -> {}", report.state);
                    if report.state == BatteryState::Shutdown {
                        info!("Battery monitor finished after shutdown");
                        return report.state;
                    }
                }
                _ = &mut stop => {
                    info!("Battery monitor stopping");
                    return self.state();
                }
            }
        }
    }
}
