//! Engine configuration. Everything the engine depends on arrives here:
//! there is no global state and no clock read, so `as_of` has no default.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_HORIZON_DAYS;
use crate::models::enums::FlagOrder;

use super::types::AdherenceError;

/// Upper bound on the projection horizon (ten years of daily points per drug).
pub const MAX_HORIZON_DAYS: u32 = 3653;

/// Score boundaries for `RiskLevel`:
/// `score < high_below` → high, `score < low_at_or_above` → moderate, otherwise low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub high_below: f64,
    pub low_at_or_above: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high_below: 0.8,
            low_at_or_above: 0.9,
        }
    }
}

/// Gap length boundaries for `GapSeverity`, inclusive:
/// `days <= minor_max` → minor, `days <= moderate_max` → moderate, otherwise severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapSeverityThresholds {
    pub minor_max: u32,
    pub moderate_max: u32,
}

impl Default for GapSeverityThresholds {
    fn default() -> Self {
        Self {
            minor_max: 7,
            moderate_max: 30,
        }
    }
}

fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Processing date. Dispenses after it are rejected; the observation window ends here (exclusive).
    pub as_of: NaiveDate,
    /// Fail on the first invalid record instead of skipping and counting it.
    #[serde(default)]
    pub strict_mode: bool,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default)]
    pub risk_thresholds: RiskThresholds,
    #[serde(default)]
    pub gap_severity_thresholds: GapSeverityThresholds,
    #[serde(default)]
    pub flag_order: FlagOrder,
}

impl EngineConfig {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            strict_mode: false,
            horizon_days: DEFAULT_HORIZON_DAYS,
            risk_thresholds: RiskThresholds::default(),
            gap_severity_thresholds: GapSeverityThresholds::default(),
            flag_order: FlagOrder::default(),
        }
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn with_risk_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.risk_thresholds = thresholds;
        self
    }

    pub fn with_gap_severity_thresholds(mut self, thresholds: GapSeverityThresholds) -> Self {
        self.gap_severity_thresholds = thresholds;
        self
    }

    pub fn with_flag_order(mut self, order: FlagOrder) -> Self {
        self.flag_order = order;
        self
    }

    pub fn validate(&self) -> Result<(), AdherenceError> {
        if self.horizon_days == 0 || self.horizon_days > MAX_HORIZON_DAYS {
            return Err(AdherenceError::Configuration(format!(
                "horizon_days must be between 1 and {MAX_HORIZON_DAYS}, got {}",
                self.horizon_days
            )));
        }

        let risk = &self.risk_thresholds;
        if !risk.high_below.is_finite() || !risk.low_at_or_above.is_finite() {
            return Err(AdherenceError::Configuration(
                "risk thresholds must be finite".into(),
            ));
        }
        if risk.high_below < 0.0 {
            return Err(AdherenceError::Configuration(format!(
                "risk high_below must not be negative, got {}",
                risk.high_below
            )));
        }
        if risk.low_at_or_above < risk.high_below {
            return Err(AdherenceError::Configuration(format!(
                "risk low_at_or_above ({}) is below high_below ({})",
                risk.low_at_or_above, risk.high_below
            )));
        }

        let gaps = &self.gap_severity_thresholds;
        if gaps.moderate_max < gaps.minor_max {
            return Err(AdherenceError::Configuration(format!(
                "gap moderate_max ({}) is below minor_max ({})",
                gaps.moderate_max, gaps.minor_max
            )));
        }

        Ok(())
    }
}
