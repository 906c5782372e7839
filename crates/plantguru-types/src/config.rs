// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of PlantGuru.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use chrono::Duration;

use crate::error::ConfigError;
use crate::granularity::GranularityTable;
use crate::projection::{ProjectionPolicy, ProjectionTable};

/// Watering reminder and detection settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WateringSettings {
    pub policy: ProjectionPolicy,
    /// Minimum soil moisture jump (percentage points) recognised as a watering
    pub detection_increase: f64,
    /// Ignore further jumps for this long after a detected watering
    pub detection_cooldown: Duration,
}

impl Default for WateringSettings {
    fn default() -> Self {
        Self {
            policy: ProjectionPolicy::Trend {
                threshold: 20.0,
                max_lookahead: Duration::days(30),
            },
            detection_increase: 10.0,
            detection_cooldown: Duration::hours(24),
        }
    }
}

/// Immutable engine configuration, built and validated once at startup and
/// passed by reference to every component.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub granularities: GranularityTable,
    pub projections: ProjectionTable,
    /// Longest accepted query span
    pub max_range: Duration,
    /// How long after a window closes before its bucket may be sealed
    pub grace_period: Duration,
    /// Expected device reporting interval, used to flag partial buckets
    pub raw_cadence: Duration,
    /// How far back a level with no sealed buckets yet is rolled up from
    pub catch_up: Duration,
    pub watering: WateringSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            granularities: GranularityTable::standard(),
            projections: ProjectionTable::standard(),
            max_range: Duration::days(90),
            grace_period: Duration::seconds(60),
            raw_cadence: Duration::minutes(5),
            catch_up: Duration::days(7),
            watering: WateringSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Check the scalar settings. The tables validate themselves on
    /// construction.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let invalid = |name: &str, reason: &str| ConfigError::InvalidSetting {
            name: name.to_owned(),
            reason: reason.to_owned(),
        };
        if self.max_range <= Duration::zero() {
            return Err(invalid("max_range", "must be positive"));
        }
        if self.grace_period < Duration::zero() {
            return Err(invalid("grace_period", "must not be negative"));
        }
        if self.raw_cadence <= Duration::zero() {
            return Err(invalid("raw_cadence", "must be positive"));
        }
        if self.catch_up <= Duration::zero() {
            return Err(invalid("catch_up", "must be positive"));
        }
        if self.watering.detection_increase <= 0.0 {
            return Err(invalid("detection_increase", "must be positive"));
        }
        match self.watering.policy {
            ProjectionPolicy::FixedInterval { interval } if interval <= Duration::zero() => {
                return Err(invalid("interval", "must be positive"));
            }
            ProjectionPolicy::Trend { max_lookahead, .. } if max_lookahead <= Duration::zero() => {
                return Err(invalid("max_lookahead", "must be positive"));
            }
            ProjectionPolicy::FixedInterval { .. } | ProjectionPolicy::Trend { .. } => {}
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_documented_limits() {
        let config = EngineConfig::default();
        assert_eq!(config.max_range, Duration::days(90));
        assert_eq!(config.grace_period, Duration::seconds(60));
        assert_eq!(config.clone().validated(), Ok(config));
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        let watering = WateringSettings {
            policy: ProjectionPolicy::FixedInterval {
                interval: Duration::zero(),
            },
            ..WateringSettings::default()
        };
        let result = EngineConfig {
            watering,
            ..EngineConfig::default()
        }
        .validated();
        assert!(matches!(result, Err(ConfigError::InvalidSetting { .. })));
    }
}
