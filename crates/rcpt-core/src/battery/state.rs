//! Debounced battery state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::config::BatteryConfig;

/// Battery monitor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    /// Normal operation.
    #[default]
    Sampling,
    /// Charge below the warning threshold.
    LowWarning,
    /// Shutdown decided, command not yet run.
    ShutdownPending,
    /// Shutdown command issued.
    Shutdown,
}

impl BatteryState {
    /// No further transitions happen from here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatteryState::ShutdownPending | BatteryState::Shutdown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryState::Sampling => "sampling",
            BatteryState::LowWarning => "low_warning",
            BatteryState::ShutdownPending => "shutdown_pending",
            BatteryState::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Entered LowWarning.
    Warn,
    /// Left LowWarning after recharging.
    Recovered,
    /// Entered ShutdownPending; run the shutdown command.
    IssueShutdown,
}

/// Thresholds and debounce length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warning: f32,
    pub shutdown: f32,
    pub debounce: u32,
}

impl Thresholds {
    /// Debounce below 2 would act on a single reading; it is raised to 2.
    pub fn new(warning: f32, shutdown: f32, debounce: u32) -> Self {
        Self {
            warning,
            shutdown,
            debounce: debounce.max(2),
        }
    }

    pub fn from_config(config: &BatteryConfig) -> Self {
        Self::new(config.warning_threshold, config.shutdown_threshold, config.debounce_readings)
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::new(20.0, 10.0, 2)
    }
}

/// Pure transition function over a sequence of readings.
///
/// Each threshold keeps its own streak of consecutive qualifying readings.
/// A sensor failure breaks every streak.
#[derive(Debug, Clone)]
pub struct BatteryMonitor {
    state: BatteryState,
    thresholds: Thresholds,
    low_streak: u32,
    critical_streak: u32,
    recovery_streak: u32,
}

impl BatteryMonitor {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            state: BatteryState::Sampling,
            thresholds,
            low_streak: 0,
            critical_streak: 0,
            recovery_streak: 0,
        }
    }

    pub fn state(&self) -> BatteryState {
        self.state
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Feed one charge percentage.
    pub fn observe(&mut self, percentage: f32) -> Option<Action> {
        if self.state.is_terminal() {
            return None;
        }

        let t = self.thresholds;
        self.critical_streak = bump(self.critical_streak, percentage < t.shutdown);
        self.low_streak = bump(self.low_streak, percentage < t.warning);
        self.recovery_streak = bump(self.recovery_streak, percentage >= t.warning);

        if self.critical_streak >= t.debounce {
            self.state = BatteryState::ShutdownPending;
            return Some(Action::IssueShutdown);
        }

        match self.state {
            BatteryState::Sampling if self.low_streak >= t.debounce => {
                self.state = BatteryState::LowWarning;
                Some(Action::Warn)
            }
            BatteryState::LowWarning if self.recovery_streak >= t.debounce => {
                self.state = BatteryState::Sampling;
                Some(Action::Recovered)
            }
            _ => None,
        }
    }

    /// A failed read: state unchanged, every streak restarts.
    pub fn sensor_failed(&mut self) {
        self.low_streak = 0;
        self.critical_streak = 0;
        self.recovery_streak = 0;
    }

    /// The shutdown command has been run, successfully or not.
    pub fn mark_shutdown(&mut self) {
        if self.state == BatteryState::ShutdownPending {
            self.state = BatteryState::Shutdown;
        }
    }
}

impl Default for BatteryMonitor {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

fn bump(streak: u32, hit: bool) -> u32 {
    if hit { streak.saturating_add(1) } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed(monitor: &mut BatteryMonitor, readings: &[f32]) -> Vec<Option<Action>> {
        readings.iter().map(|&p| monitor.observe(p)).collect()
    }

    #[test]
    fn test_single_low_reading_does_not_trip() {
        let mut monitor = BatteryMonitor::default();
        assert_eq!(monitor.observe(5.0), None);
        assert_eq!(monitor.state(), BatteryState::Sampling);
    }

    #[test]
    fn test_two_consecutive_low_readings_trip() {
        let mut monitor = BatteryMonitor::default();
        let actions = feed(&mut monitor, &[5.0, 5.0]);

        assert_eq!(actions, vec![None, Some(Action::IssueShutdown)]);
        assert_eq!(monitor.state(), BatteryState::ShutdownPending);
    }

    #[test]
    fn test_sensor_failure_resets_debounce() {
        let mut monitor = BatteryMonitor::default();
        monitor.observe(5.0);
        monitor.sensor_failed();
        assert_eq!(monitor.observe(5.0), None);
        assert_eq!(monitor.state(), BatteryState::Sampling);
        assert_eq!(monitor.observe(5.0), Some(Action::IssueShutdown));
    }

    #[test]
    fn test_interrupted_streak_does_not_trip() {
        let mut monitor = BatteryMonitor::default();
        let actions = feed(&mut monitor, &[5.0, 50.0, 5.0]);

        assert_eq!(actions, vec![None, None, None]);
        assert_eq!(monitor.state(), BatteryState::Sampling);
    }

    #[test]
    fn test_warning_then_shutdown() {
        let mut monitor = BatteryMonitor::default();
        let actions = feed(&mut monitor, &[15.0, 15.0, 9.0, 8.5]);

        assert_eq!(
            actions,
            vec![None, Some(Action::Warn), None, Some(Action::IssueShutdown)]
        );
    }

    #[test]
    fn test_recovery_from_warning() {
        let mut monitor = BatteryMonitor::default();
        feed(&mut monitor, &[15.0, 15.0]);
        assert_eq!(monitor.state(), BatteryState::LowWarning);

        assert_eq!(monitor.observe(25.0), None);
        assert_eq!(monitor.observe(25.0), Some(Action::Recovered));
        assert_eq!(monitor.state(), BatteryState::Sampling);
    }

    #[test]
    fn test_terminal_states_ignore_readings() {
        let mut monitor = BatteryMonitor::default();
        feed(&mut monitor, &[1.0, 1.0]);

        assert_eq!(monitor.observe(1.0), None);
        monitor.mark_shutdown();
        assert_eq!(monitor.state(), BatteryState::Shutdown);
        assert_eq!(monitor.observe(100.0), None);
        assert_eq!(monitor.state(), BatteryState::Shutdown);
    }

    #[test]
    fn test_debounce_never_below_two() {
        let mut monitor = BatteryMonitor::new(Thresholds::new(20.0, 10.0, 0));
        assert_eq!(monitor.thresholds().debounce, 2);
        assert_eq!(monitor.observe(1.0), None);
    }

    #[test]
    fn test_longer_debounce() {
        let mut monitor = BatteryMonitor::new(Thresholds::new(20.0, 10.0, 3));
        let actions = feed(&mut monitor, &[1.0, 1.0, 1.0]);
        assert_eq!(actions, vec![None, None, Some(Action::IssueShutdown)]);
    }
}
