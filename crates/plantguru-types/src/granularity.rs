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

/// Bucket coarseness, finest first. Declaration order is the rollup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "raw")]
    Raw,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "12h")]
    Hour12,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
    #[serde(rename = "1mo")]
    Month1,
}

impl Granularity {
    pub const ALL: [Granularity; 9] = [
        Self::Raw,
        Self::Minute5,
        Self::Minute15,
        Self::Minute30,
        Self::Hour1,
        Self::Hour12,
        Self::Day1,
        Self::Week1,
        Self::Month1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Minute30 => "30m",
            Self::Hour1 => "1h",
            Self::Hour12 => "12h",
            Self::Day1 => "1d",
            Self::Week1 => "1w",
            Self::Month1 => "1mo",
        }
    }

    /// Position in the coarseness order (RAW = 0)
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_raw(self) -> bool {
        self == Self::Raw
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidSetting {
                name: "granularity".to_owned(),
                reason: format!("unknown granularity '{s}'"),
            })
    }
}

/// One row of the granularity table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranularityLevel {
    pub granularity: Granularity,
    /// Bucket width in minutes; `None` only for RAW
    pub width_minutes: Option<u32>,
    /// Maximum age (hours) for which this level is the finest one queried.
    /// `None` means unbounded and is only allowed on the coarsest level.
    pub threshold_hours: Option<u32>,
    /// Finer level this one is rolled up from; `None` only for RAW
    pub source: Option<Granularity>,
}

impl GranularityLevel {
    const fn new(
        granularity: Granularity,
        width_minutes: Option<u32>,
        threshold_hours: Option<u32>,
        source: Option<Granularity>,
    ) -> Self {
        Self {
            granularity,
            width_minutes,
            threshold_hours,
            source,
        }
    }
}

/// Validated mapping from coarseness level to bucket width, retention
/// threshold and rollup source.
///
/// The thresholds partition the age axis `[0, ∞)` into contiguous regimes:
/// level `i` owns ages in `(threshold[i-1], threshold[i]]`, RAW owns
/// `[0, threshold[0]]` and the coarsest level owns everything beyond.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranularityTable {
    levels: Vec<GranularityLevel>,
}

impl Default for GranularityTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl GranularityTable {
    /// Build a table, rejecting anything that is not contiguous and monotonic.
    pub fn new(levels: Vec<GranularityLevel>) -> Result<Self, ConfigError> {
        validate_levels(&levels)?;
        Ok(Self { levels })
    }

    /// The built-in table used when no overrides are configured
    pub fn standard() -> Self {
        use Granularity::{Day1, Hour1, Hour12, Minute5, Minute15, Minute30, Month1, Raw, Week1};
        Self {
            levels: vec![
                GranularityLevel::new(Raw, None, Some(2), None),
                GranularityLevel::new(Minute5, Some(5), Some(3), Some(Raw)),
                GranularityLevel::new(Minute15, Some(15), Some(12), Some(Minute5)),
                GranularityLevel::new(Minute30, Some(30), Some(24), Some(Minute15)),
                GranularityLevel::new(Hour1, Some(60), Some(84), Some(Minute30)),
                GranularityLevel::new(Hour12, Some(720), Some(168), Some(Hour1)),
                GranularityLevel::new(Day1, Some(1440), Some(360), Some(Hour12)),
                GranularityLevel::new(Week1, Some(10080), Some(1080), Some(Day1)),
                // 30-day month; not a whole number of weeks, so it rolls up from days
                GranularityLevel::new(Month1, Some(43200), None, Some(Day1)),
            ],
        }
    }

    pub fn levels(&self) -> &[GranularityLevel] {
        &self.levels
    }

    pub fn level(&self, granularity: Granularity) -> &GranularityLevel {
        &self.levels[granularity.index()]
    }

    /// Finest granularity whose threshold covers `age`. Negative ages
    /// (instants in the future) count as age zero. An age sitting exactly on a
    /// threshold belongs to the finer level.
    pub fn granularity_for(&self, age: Duration) -> Granularity {
        let age = age.max(Duration::zero());
        self.levels
            .iter()
            .find(|level| match level.threshold_hours {
                Some(hours) => age <= Duration::hours(i64::from(hours)),
                None => true,
            })
            .map_or(Granularity::Month1, |level| level.granularity)
    }

    pub fn bucket_width_minutes(&self, granularity: Granularity) -> Option<u32> {
        self.level(granularity).width_minutes
    }

    pub fn bucket_width(&self, granularity: Granularity) -> Option<Duration> {
        self.bucket_width_minutes(granularity)
            .map(|m| Duration::minutes(i64::from(m)))
    }

    pub fn threshold_hours(&self, granularity: Granularity) -> Option<u32> {
        self.level(granularity).threshold_hours
    }

    pub fn threshold(&self, granularity: Granularity) -> Option<Duration> {
        self.threshold_hours(granularity)
            .map(|h| Duration::hours(i64::from(h)))
    }

    pub fn source(&self, granularity: Granularity) -> Option<Granularity> {
        self.level(granularity).source
    }

    /// Non-raw levels in rollup order (finest first)
    pub fn rollup_chain(&self) -> impl Iterator<Item = &GranularityLevel> {
        self.levels.iter().filter(|level| !level.granularity.is_raw())
    }

    /// Start of the bucket containing `ts`, aligned to the Unix epoch.
    /// RAW has no buckets, so its "bucket" is the second itself.
    pub fn bucket_start(&self, granularity: Granularity, ts: DateTime<Utc>) -> DateTime<Utc> {
        let whole = truncate_to_second(ts);
        match self.bucket_width(granularity) {
            Some(width) => {
                let width_secs = width.num_seconds();
                whole - Duration::seconds(whole.timestamp().rem_euclid(width_secs))
            }
            None => whole,
        }
    }
}

/// Drop sub-second precision
pub fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts - Duration::nanoseconds(i64::from(ts.timestamp_subsec_nanos()))
}

fn validate_levels(levels: &[GranularityLevel]) -> Result<(), ConfigError> {
    if levels.len() != Granularity::ALL.len() {
        return Err(ConfigError::LevelCount(levels.len()));
    }

    for (position, expected) in Granularity::ALL.iter().enumerate() {
        let found = levels.get(position).map(|l| l.granularity);
        if found != Some(*expected) {
            return Err(ConfigError::LevelOrder {
                position,
                expected: *expected,
                found,
            });
        }
    }

    let raw = &levels[0];
    if raw.width_minutes.is_some() || raw.source.is_some() {
        return Err(ConfigError::RawShape);
    }

    for level in &levels[1..] {
        let width = match level.width_minutes {
            Some(w) if w > 0 => w,
            _ => return Err(ConfigError::MissingWidth(level.granularity)),
        };
        let source = match level.source {
            Some(s) if s < level.granularity => s,
            other => {
                return Err(ConfigError::InvalidSource {
                    granularity: level.granularity,
                    source_level: other,
                });
            }
        };
        if let Some(source_width) = levels[source.index()].width_minutes
            && width % source_width != 0
        {
            return Err(ConfigError::WidthNotMultiple {
                granularity: level.granularity,
                width,
                source_level: source,
                source_width,
            });
        }
    }

    for pair in levels[1..].windows(2) {
        if pair[1].width_minutes <= pair[0].width_minutes {
            return Err(ConfigError::NonMonotonicWidth {
                finer: pair[0].granularity,
                coarser: pair[1].granularity,
            });
        }
    }

    let last_index = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        match (level.threshold_hours, i == last_index) {
            (None, false) => return Err(ConfigError::UnboundedBeforeLast(level.granularity)),
            (Some(_), true) => return Err(ConfigError::BoundedLast(level.granularity)),
            (Some(0), false) => return Err(ConfigError::ZeroThreshold(level.granularity)),
            _ => {}
        }
    }

    for pair in levels[..last_index].windows(2) {
        if let (Some(finer_hours), Some(coarser_hours)) =
            (pair[0].threshold_hours, pair[1].threshold_hours)
            && coarser_hours <= finer_hours
        {
            return Err(ConfigError::NonMonotonicThreshold {
                finer: pair[0].granularity,
                finer_hours,
                coarser: pair[1].granularity,
                coarser_hours,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn standard_levels() -> Vec<GranularityLevel> {
        GranularityTable::standard().levels().to_vec()
    }

    #[test]
    fn test_standard_table_is_valid() {
        let table = GranularityTable::new(standard_levels()).unwrap();
        assert_eq!(table, GranularityTable::standard());
    }

    #[test]
    fn test_every_age_maps_to_exactly_one_regime() {
        let table = GranularityTable::standard();
        // Walk the age axis minute by minute over a bit more than a year
        let mut previous = Granularity::Raw;
        for minutes in (0..=60 * 24 * 400).step_by(7) {
            let age = Duration::minutes(minutes);
            let g = table.granularity_for(age);
            assert!(g >= previous, "regimes must not go finer as age grows");

            let level = table.level(g);
            if let Some(hours) = level.threshold_hours {
                assert!(age <= Duration::hours(i64::from(hours)));
            }
            // Every finer level must already have run out at this age
            for finer in &table.levels()[..g.index()] {
                let hours = finer.threshold_hours.unwrap();
                assert!(age > Duration::hours(i64::from(hours)));
            }
            previous = g;
        }
        assert_eq!(previous, Granularity::Month1);
    }

    #[test]
    fn test_threshold_boundary_belongs_to_finer_level() {
        let table = GranularityTable::standard();
        assert_eq!(table.granularity_for(Duration::hours(2)), Granularity::Raw);
        assert_eq!(
            table.granularity_for(Duration::hours(2) + Duration::seconds(1)),
            Granularity::Minute5
        );
        assert_eq!(table.granularity_for(Duration::hours(84)), Granularity::Hour1);
        assert_eq!(
            table.granularity_for(Duration::hours(84) + Duration::seconds(1)),
            Granularity::Hour12
        );
    }

    #[test]
    fn test_five_minute_regime_ends_at_three_hours() {
        let table = GranularityTable::standard();
        assert_eq!(table.threshold_hours(Granularity::Minute5), Some(3));
        assert_eq!(table.granularity_for(Duration::hours(3)), Granularity::Minute5);
        assert_eq!(table.granularity_for(Duration::hours(4)), Granularity::Minute15);
    }

    #[test]
    fn test_future_instants_use_finest_level() {
        let table = GranularityTable::standard();
        assert_eq!(table.granularity_for(Duration::hours(-3)), Granularity::Raw);
    }

    #[test]
    fn test_lookups() {
        let table = GranularityTable::standard();
        assert_eq!(table.bucket_width_minutes(Granularity::Raw), None);
        assert_eq!(table.bucket_width_minutes(Granularity::Minute15), Some(15));
        assert_eq!(table.threshold_hours(Granularity::Minute30), Some(24));
        assert_eq!(table.threshold_hours(Granularity::Month1), None);
        assert_eq!(table.source(Granularity::Week1), Some(Granularity::Day1));
        assert_eq!(table.source(Granularity::Month1), Some(Granularity::Day1));
        let chain: Vec<_> = table.rollup_chain().map(|l| l.granularity).collect();
        assert_eq!(chain.first(), Some(&Granularity::Minute5));
        assert_eq!(chain.len(), 8);
    }

    #[test]
    fn test_rejects_gap_in_age_axis() {
        let mut levels = standard_levels();
        levels[3].threshold_hours = None;
        assert_eq!(
            GranularityTable::new(levels),
            Err(ConfigError::UnboundedBeforeLast(Granularity::Minute30))
        );
    }

    #[test]
    fn test_rejects_bounded_coarsest_level() {
        let mut levels = standard_levels();
        levels[8].threshold_hours = Some(4380);
        assert_eq!(
            GranularityTable::new(levels),
            Err(ConfigError::BoundedLast(Granularity::Month1))
        );
    }

    #[test]
    fn test_rejects_overlapping_thresholds() {
        let mut levels = standard_levels();
        levels[2].threshold_hours = Some(6);
        assert!(matches!(
            GranularityTable::new(levels),
            Err(ConfigError::NonMonotonicThreshold {
                coarser: Granularity::Minute15,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_width_that_does_not_nest() {
        let mut levels = standard_levels();
        levels[8].source = Some(Granularity::Week1);
        assert!(matches!(
            GranularityTable::new(levels),
            Err(ConfigError::WidthNotMultiple {
                granularity: Granularity::Month1,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_missing_level() {
        let mut levels = standard_levels();
        levels.remove(4);
        assert_eq!(
            GranularityTable::new(levels),
            Err(ConfigError::LevelCount(8))
        );
    }

    #[test]
    fn test_bucket_start_is_epoch_aligned() {
        let table = GranularityTable::standard();
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 10, 7, 42).unwrap();
        assert_eq!(
            table.bucket_start(Granularity::Minute5, ts),
            Utc.with_ymd_and_hms(2025, 3, 14, 10, 5, 0).unwrap()
        );
        assert_eq!(
            table.bucket_start(Granularity::Hour12, ts),
            Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap()
        );
        assert_eq!(table.bucket_start(Granularity::Raw, ts), ts);
    }
}
