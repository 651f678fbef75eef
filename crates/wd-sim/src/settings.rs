//! Hydraulic run settings.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Timing and termination options pushed into the engine before a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydraulicSettings {
    /// Simulated horizon (seconds)
    pub duration_s: u64,
    pub hydraulic_step_s: u64,
    pub pattern_step_s: u64,
    pub report_step_s: u64,
    /// Record every solved period, not only report times.
    pub save_all_steps: bool,
    /// Stop at the first warning instead of finishing the horizon.
    pub stop_on_warning: bool,
}

impl Default for HydraulicSettings {
    fn default() -> Self {
        Self {
            duration_s: 24 * 3600,
            hydraulic_step_s: 3600,
            pattern_step_s: 3600,
            report_step_s: 3600,
            save_all_steps: true,
            stop_on_warning: false,
        }
    }
}

impl HydraulicSettings {
    pub fn validate(&self) -> SimResult<()> {
        if self.hydraulic_step_s == 0 {
            return Err(SimError::InvalidArg {
                what: "hydraulic_step_s must be positive",
            });
        }
        if self.pattern_step_s == 0 {
            return Err(SimError::InvalidArg {
                what: "pattern_step_s must be positive",
            });
        }
        if self.report_step_s == 0 {
            return Err(SimError::InvalidArg {
                what: "report_step_s must be positive",
            });
        }
        Ok(())
    }

    /// Whether results at time `t` are kept.
    pub fn records(&self, t: u64) -> bool {
        self.save_all_steps || t % self.report_step_s == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_one_day_hourly() {
        let s = HydraulicSettings::default();
        s.validate().unwrap();
        assert_eq!(s.duration_s / s.hydraulic_step_s, 24);
    }

    #[test]
    fn zero_step_is_rejected() {
        let s = HydraulicSettings {
            hydraulic_step_s: 0,
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(SimError::InvalidArg { .. })));
    }

    #[test]
    fn report_filter() {
        let s = HydraulicSettings {
            save_all_steps: false,
            report_step_s: 7200,
            ..Default::default()
        };
        assert!(s.records(0));
        assert!(!s.records(3600));
        assert!(s.records(7200));
    }
}
