use crate::business_days::BusinessCalendar;
use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PICKER_LOOKAHEAD_MONTHS: u32 = 3;
pub const DEFAULT_MAX_OCCURRENCES: usize = 10_000;
const MAX_PICKER_LOOKAHEAD_MONTHS: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub business_calendar: BusinessCalendar,

    /// How far past today the period picker looks.
    #[serde(default = "default_picker_lookahead_months")]
    pub picker_lookahead_months: u32,

    /// Upper bound on occurrences emitted per obligation per window.
    #[serde(default = "default_max_occurrences")]
    pub max_occurrences: usize,
}

fn default_picker_lookahead_months() -> u32 {
    DEFAULT_PICKER_LOOKAHEAD_MONTHS
}

fn default_max_occurrences() -> usize {
    DEFAULT_MAX_OCCURRENCES
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            business_calendar: BusinessCalendar::default(),
            picker_lookahead_months: DEFAULT_PICKER_LOOKAHEAD_MONTHS,
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let mut distinct = self.business_calendar.weekend_days.clone();
        distinct.sort_by_key(|d| d.num_days_from_monday());
        distinct.dedup();
        if distinct.len() >= 7 {
            return Err(TrackerError::Config(
                "weekend_days cannot cover every day of the week".to_string(),
            ));
        }

        if self.picker_lookahead_months > MAX_PICKER_LOOKAHEAD_MONTHS {
            return Err(TrackerError::Config(format!(
                "picker_lookahead_months {} exceeds the maximum of {}",
                self.picker_lookahead_months, MAX_PICKER_LOOKAHEAD_MONTHS
            )));
        }

        if self.max_occurrences == 0 {
            return Err(TrackerError::Config(
                "max_occurrences must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
