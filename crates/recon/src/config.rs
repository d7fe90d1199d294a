use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Match config
// ---------------------------------------------------------------------------

/// Tuning knobs for one reconciliation run.
///
/// The surface is closed: any key other than the four below is rejected,
/// so a typo never silently falls back to a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MatchConfig {
    /// Enables pass 5 (group / partial matching). Off unless asked for.
    pub allow_partial: bool,
    pub date_tolerance_days: i64,
    pub amount_tolerance_abs: Decimal,
    pub amount_tolerance_pct: Decimal,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            allow_partial: false,
            date_tolerance_days: 7,
            amount_tolerance_abs: Decimal::new(100, 2),
            amount_tolerance_pct: Decimal::new(5, 3),
        }
    }
}

/// Largest group pass 5 will assemble on either side.
pub const MAX_GROUP_SIZE: usize = 4;

/// Node budget for one pass 5 subset search. A search that runs out is
/// treated as "no match".
pub const MAX_SEARCH_NODES: u64 = 20_000;

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MatchConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: MatchConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: MatchConfig =
            serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.date_tolerance_days < 0 {
            return Err(ConfigError::OutOfRange {
                option: "date_tolerance_days",
                message: format!("must be >= 0, got {}", self.date_tolerance_days),
            });
        }

        if self.amount_tolerance_abs < Decimal::ZERO {
            return Err(ConfigError::OutOfRange {
                option: "amount_tolerance_abs",
                message: format!("must be >= 0, got {}", self.amount_tolerance_abs),
            });
        }

        if self.amount_tolerance_pct < Decimal::ZERO || self.amount_tolerance_pct > Decimal::ONE {
            return Err(ConfigError::OutOfRange {
                option: "amount_tolerance_pct",
                message: format!(
                    "must be a fraction in [0, 1], got {}",
                    self.amount_tolerance_pct
                ),
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
