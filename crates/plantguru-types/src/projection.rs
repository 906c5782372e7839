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

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::granularity::{Granularity, GranularityTable};

/// Forecast horizons offered to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionHorizon {
    Hour,
    TwelveHours,
    Day,
    Week,
    Month,
}

impl ProjectionHorizon {
    pub const ALL: [ProjectionHorizon; 5] = [
        Self::Hour,
        Self::TwelveHours,
        Self::Day,
        Self::Week,
        Self::Month,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::TwelveHours => "twelve_hours",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ProjectionHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectionHorizon {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidSetting {
                name: "horizon".to_owned(),
                reason: format!("unknown horizon '{s}'"),
            })
    }
}

/// How far to forecast, at which resolution, and how much history to fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonSettings {
    pub hours: u32,
    pub granularity: Granularity,
    pub past_hours: u32,
}

impl HorizonSettings {
    pub fn horizon(&self) -> Duration {
        Duration::hours(i64::from(self.hours))
    }

    pub fn lookback(&self) -> Duration {
        Duration::hours(i64::from(self.past_hours))
    }
}

/// Per-horizon projection settings, one entry for every [`ProjectionHorizon`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionTable {
    entries: [HorizonSettings; 5],
}

impl Default for ProjectionTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl ProjectionTable {
    pub fn new(
        entries: [HorizonSettings; 5],
        granularities: &GranularityTable,
    ) -> Result<Self, ConfigError> {
        for (horizon, settings) in ProjectionHorizon::ALL.iter().zip(entries.iter()) {
            let invalid = |reason: &str| ConfigError::InvalidProjection {
                horizon: horizon.as_str().to_owned(),
                reason: reason.to_owned(),
            };
            if settings.hours == 0 || settings.past_hours == 0 {
                return Err(invalid("hours and past_hours must be positive"));
            }
            let Some(width) = granularities.bucket_width(settings.granularity) else {
                return Err(invalid("projections read aggregated buckets, not raw readings"));
            };
            if width > settings.horizon() || width > settings.lookback() {
                return Err(invalid("bucket width exceeds the horizon or lookback window"));
            }
        }
        Ok(Self { entries })
    }

    /// Each horizon looks back as far as it looks ahead
    pub fn standard() -> Self {
        let entry = |hours: u32, granularity| HorizonSettings {
            hours,
            granularity,
            past_hours: hours,
        };
        Self {
            entries: [
                entry(1, Granularity::Minute5),
                entry(12, Granularity::Minute15),
                entry(24, Granularity::Hour1),
                entry(24 * 7, Granularity::Hour12),
                entry(24 * 30, Granularity::Hour12),
            ],
        }
    }

    pub fn settings(&self, horizon: ProjectionHorizon) -> &HorizonSettings {
        &self.entries[horizon.index()]
    }

    pub fn entries(&self) -> &[HorizonSettings; 5] {
        &self.entries
    }
}

/// Next-event policy, selected by configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionPolicy {
    /// Next event is the last observed event plus a fixed interval
    FixedInterval { interval: Duration },
    /// Next event is where the fitted trend drops to `threshold`
    Trend {
        threshold: f64,
        max_lookahead: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionStatus {
    Ok,
    InsufficientData,
    NoCrossing,
}

impl ProjectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::InsufficientData => "insufficient_data",
            Self::NoCrossing => "no_crossing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// Decays linearly from 1.0 at `now` towards 0 at the end of the horizon
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub points: Vec<ProjectedPoint>,
    pub next_event: Option<DateTime<Utc>>,
    pub status: ProjectionStatus,
}

impl ProjectionResult {
    pub fn insufficient_data() -> Self {
        Self {
            points: Vec::new(),
            next_event: None,
            status: ProjectionStatus::InsufficientData,
        }
    }
}
