//! Fuel gauge access.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::SensorError;

/// One voltage/current reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeSample {
    /// Bus voltage in volts.
    pub volts: f32,
    /// Current in amps; negative while discharging on some wirings.
    pub amps: f32,
}

/// A voltage/current sensor.
pub trait FuelGauge: Send {
    fn read(&mut self) -> Result<GaugeSample, SensorError>;
}

/// INA219-class gauge exposed by the Linux `ina2xx` hwmon driver.
///
/// Reads `in1_input` (bus voltage, mV) and `curr1_input` (current, mA).
#[derive(Debug, Clone)]
pub struct HwmonFuelGauge {
    dir: PathBuf,
}

impl HwmonFuelGauge {
    /// Use a specific hwmon device directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Find the device whose `name` file matches `chip_name` under `root`.
    pub fn discover(root: &Path, chip_name: &str) -> Result<Self, SensorError> {
        let entries = fs::read_dir(root).map_err(|e| {
            SensorError::Unavailable(format!("cannot list {}: {}", root.display(), e))
        })?;

        let mut dirs: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        dirs.sort();

        for dir in dirs {
            let Ok(name) = fs::read_to_string(dir.join("name")) else {
                continue;
            };
            if name.trim() == chip_name {
                debug!("Found {} at {}", chip_name, dir.display());
                return Ok(Self::at(dir));
            }
        }

        Err(SensorError::Unavailable(format!(
            "no hwmon device named '{}' under {}",
            chip_name,
            root.display()
        )))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_milli(&self, file: &str) -> Result<f32, SensorError> {
        let path = self.dir.join(file);
        let text = fs::read_to_string(&path)
            .map_err(|e| SensorError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let value: i64 = text.trim().parse().map_err(|_| {
            SensorError::Unavailable(format!("{}: unexpected value '{}'", path.display(), text.trim()))
        })?;
        Ok(value as f32 / 1000.0)
    }
}

impl FuelGauge for HwmonFuelGauge {
    fn read(&mut self) -> Result<GaugeSample, SensorError> {
        Ok(GaugeSample {
            volts: self.read_milli("in1_input")?,
            amps: self.read_milli("curr1_input")?,
        })
    }
}

/// Hwmon gauge located by chip name when it is first read.
///
/// While the chip is absent every read fails with
/// [`SensorError::Unavailable`]. A failed read drops the located device so
/// the next read searches again, following renumbered hwmon directories.
#[derive(Debug, Clone)]
pub struct DiscoveringFuelGauge {
    root: PathBuf,
    chip_name: String,
    device: Option<HwmonFuelGauge>,
}

impl DiscoveringFuelGauge {
    pub fn new(root: impl Into<PathBuf>, chip_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            chip_name: chip_name.into(),
            device: None,
        }
    }

    /// Directory of the located device, if any.
    pub fn dir(&self) -> Option<&Path> {
        self.device.as_ref().map(|d| d.dir())
    }
}

impl FuelGauge for DiscoveringFuelGauge {
    fn read(&mut self) -> Result<GaugeSample, SensorError> {
        let mut device = match self.device.take() {
            Some(device) => device,
            None => HwmonFuelGauge::discover(&self.root, &self.chip_name)?,
        };

        let sample = device.read();
        if sample.is_ok() {
            self.device = Some(device);
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fake_hwmon(root: &Path, index: u32, name: &str, millivolts: &str, milliamps: &str) -> PathBuf {
        let dir = root.join(format!("hwmon{index}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{name}\n")).unwrap();
        fs::write(dir.join("in1_input"), millivolts).unwrap();
        fs::write(dir.join("curr1_input"), milliamps).unwrap();
        dir
    }

    #[test]
    fn test_discover_and_read() {
        let root = tempfile::tempdir().unwrap();
        fake_hwmon(root.path(), 0, "cpu_thermal", "0", "0");
        let expected = fake_hwmon(root.path(), 1, "ina219", "3875\n", "-412\n");

        let mut gauge = HwmonFuelGauge::discover(root.path(), "ina219").unwrap();
        assert_eq!(gauge.dir(), expected.as_path());

        let sample = gauge.read().unwrap();
        assert!((sample.volts - 3.875).abs() < 1e-6);
        assert!((sample.amps + 0.412).abs() < 1e-6);
    }

    #[test]
    fn test_missing_chip() {
        let root = tempfile::tempdir().unwrap();
        fake_hwmon(root.path(), 0, "cpu_thermal", "0", "0");

        let result = HwmonFuelGauge::discover(root.path(), "ina219");
        assert!(matches!(result, Err(SensorError::Unavailable(_))));
    }

    #[test]
    fn test_discovering_gauge_waits_for_chip() {
        let root = tempfile::tempdir().unwrap();
        let mut gauge = DiscoveringFuelGauge::new(root.path(), "ina219");

        assert!(matches!(gauge.read(), Err(SensorError::Unavailable(_))));
        assert_eq!(gauge.dir(), None);

        let dir = fake_hwmon(root.path(), 2, "ina219", "4100", "120");
        let sample = gauge.read().unwrap();
        assert!((sample.volts - 4.1).abs() < 1e-6);
        assert_eq!(gauge.dir(), Some(dir.as_path()));

        fs::remove_dir_all(&dir).unwrap();
        assert!(gauge.read().is_err());
        assert_eq!(gauge.dir(), None);
    }

    #[test]
    fn test_unreadable_value() {
        let root = tempfile::tempdir().unwrap();
        let dir = fake_hwmon(root.path(), 0, "ina219", "garbage", "0");

        let mut gauge = HwmonFuelGauge::at(dir);
        assert!(matches!(gauge.read(), Err(SensorError::Unavailable(_))));
    }
}
