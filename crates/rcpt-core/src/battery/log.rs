//! Reading log: one JSON object per line.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::BatteryState;

/// One logged tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volts: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amps: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f32>,
    /// State after the tick.
    pub state: BatteryState,
    /// Sensor error, when the read failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Destination for reading records.
pub trait ReadingLog: Send {
    fn append(&mut self, record: &ReadingRecord) -> std::io::Result<()>;
}

/// Appends records to a JSON lines file.
#[derive(Debug, Clone)]
pub struct JsonLinesLog {
    path: PathBuf,
}

impl JsonLinesLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReadingLog for JsonLinesLog {
    fn append(&mut self, record: &ReadingRecord) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_lines_append() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = JsonLinesLog::new(dir.path().join("logs").join("battery.log"));

        let record = ReadingRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 7, 4, 12, 0, 0).unwrap(),
            volts: Some(3.9),
            amps: Some(-0.4),
            percentage: Some(66.7),
            state: BatteryState::Sampling,
            error: None,
        };
        log.append(&record).unwrap();
        log.append(&record).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: ReadingRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, record);
        assert!(!lines[0].contains("error"));
    }
}
