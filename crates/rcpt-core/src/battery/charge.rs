//! Voltage to state-of-charge mapping.

use crate::error::RcptError;
use crate::models::config::{BatteryConfig, CurvePoint};

/// Maps a bus voltage to a charge percentage.
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeModel {
    /// Straight line between an empty and a full voltage.
    Linear { min_volts: f32, max_volts: f32 },
    /// Piecewise linear curve, ascending by voltage.
    Curve(Vec<CurvePoint>),
}

impl ChargeModel {
    /// Pick the curve when one is configured, the linear mapping otherwise.
    pub fn from_config(config: &BatteryConfig) -> Result<Self, RcptError> {
        if config.voltage_curve.is_empty() {
            if config.max_voltage <= config.min_voltage {
                return Err(RcptError::Config(format!(
                    "max_voltage ({}) must exceed min_voltage ({})",
                    config.max_voltage, config.min_voltage
                )));
            }
            return Ok(Self::Linear {
                min_volts: config.min_voltage,
                max_volts: config.max_voltage,
            });
        }

        let curve = &config.voltage_curve;
        if curve.len() < 2 {
            return Err(RcptError::Config("voltage_curve needs at least two points".to_string()));
        }
        let monotonic = curve
            .windows(2)
            .all(|w| w[1].volts > w[0].volts && w[1].percent >= w[0].percent);
        if !monotonic {
            return Err(RcptError::Config(
                "voltage_curve must rise in both volts and percent".to_string(),
            ));
        }

        Ok(Self::Curve(curve.clone()))
    }

    /// Charge percentage, clamped to 0-100 and rounded to one decimal.
    pub fn percentage(&self, volts: f32) -> f32 {
        let raw = match self {
            Self::Linear { min_volts, max_volts } => {
                (volts - min_volts) / (max_volts - min_volts) * 100.0
            }
            Self::Curve(points) => interpolate(points, volts),
        };
        round_tenth(raw.clamp(0.0, 100.0))
    }
}

fn interpolate(points: &[CurvePoint], volts: f32) -> f32 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return 0.0;
    };
    if volts <= first.volts {
        return first.percent;
    }
    if volts >= last.volts {
        return last.percent;
    }

    points
        .windows(2)
        .find(|w| volts <= w[1].volts)
        .map(|w| {
            let span = (volts - w[0].volts) / (w[1].volts - w[0].volts);
            w[0].percent + span * (w[1].percent - w[0].percent)
        })
        .unwrap_or(last.percent)
}

fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
