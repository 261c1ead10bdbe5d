use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::scan::camera::Facing;

/// A named shift window, `start` inclusive and `end` exclusive. A window whose
/// end is not after its start wraps past midnight.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShiftWindow {
    pub name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ShiftWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start < self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct KioskConfiguration {
    pub scan_cooldown_ms: u64,
    pub success_delay_ms: u64,
    pub error_delay_ms: u64,
    pub frame_interval_ms: u64,
    pub max_frame_dimension: u32,
    pub camera_facing: Facing,
    pub shifts: Vec<ShiftWindow>,
}

impl Default for KioskConfiguration {
    fn default() -> Self {
        let at = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or_default();
        Self {
            scan_cooldown_ms: 500,
            success_delay_ms: 3000,
            error_delay_ms: 2500,
            frame_interval_ms: 33,
            max_frame_dimension: 640,
            camera_facing: Facing::Environment,
            shifts: vec![
                ShiftWindow { name: "Shift 1".to_string(), start: at(6), end: at(16) },
                ShiftWindow { name: "Shift 2".to_string(), start: at(16), end: at(6) },
            ],
        }
    }
}

impl KioskConfiguration {
    pub fn scan_cooldown(&self) -> Duration {
        Duration::from_millis(self.scan_cooldown_ms)
    }

    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.success_delay_ms)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Name of the first configured shift covering `time`.
    pub fn infer_shift(&self, time: NaiveTime) -> Option<&str> {
        self.shifts
            .iter()
            .find(|shift| shift.contains(time))
            .map(|shift| shift.name.as_str())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        info!("kiosk configuration written to {}", path.as_ref().display());
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Reads the configuration, writing the defaults first when the file is missing.
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if !path.as_ref().exists() {
            warn!("{} not found, writing defaults", path.as_ref().display());
            let config = Self::default();
            config.save_to_file(&path)?;
            return Ok(config);
        }
        Self::from_file(path)
    }
}
