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

//! Forward estimates from sealed history.
//!
//! A least-squares line is fitted through the bucket averages of the trailing
//! lookback window and extended over the forecast horizon. For the soil
//! moisture metrics the configured watering policy also yields the next
//! watering time.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use plantguru_types::{
    EngineConfig, Metric, ProjectedPoint, ProjectionHorizon, ProjectionPolicy, ProjectionResult,
    ProjectionStatus,
};

use crate::error::EngineResult;
use crate::store::SeriesStore;

/// `value(t) = intercept + slope_per_sec * (t - origin)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendLine {
    pub origin: DateTime<Utc>,
    pub intercept: f64,
    pub slope_per_sec: f64,
}

impl TrendLine {
    /// Least-squares fit. Needs at least two samples; identical timestamps
    /// or identical values give a flat line.
    #[expect(
        clippy::cast_precision_loss,
        reason = "sample counts and second offsets are far below 2^52"
    )]
    pub fn fit(samples: &[(DateTime<Utc>, f64)]) -> Option<Self> {
        let (first, _) = *samples.first()?;
        if samples.len() < 2 {
            return None;
        }

        let n = samples.len() as f64;
        let xs: Vec<f64> = samples
            .iter()
            .map(|(t, _)| (*t - first).num_seconds() as f64)
            .collect();
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = samples.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (x, (_, y)) in xs.iter().zip(samples) {
            sxx += (x - mean_x) * (x - mean_x);
            sxy += (x - mean_x) * (y - mean_y);
        }
        let slope_per_sec = if sxx > 0.0 { sxy / sxx } else { 0.0 };

        Some(Self {
            origin: first,
            intercept: mean_y - slope_per_sec * mean_x,
            slope_per_sec,
        })
    }

    #[expect(clippy::cast_precision_loss, reason = "second offsets fit in f64")]
    pub fn value_at(&self, t: DateTime<Utc>) -> f64 {
        self.intercept + self.slope_per_sec * (t - self.origin).num_seconds() as f64
    }
}

/// Next event under the fixed-interval policy
pub fn fixed_interval_next_event(
    last_event: Option<DateTime<Utc>>,
    interval: Duration,
) -> Option<DateTime<Utc>> {
    last_event.map(|at| at + interval)
}

/// When a falling trend reaches `threshold`, or `None` if it never does
/// within `max_lookahead` of `now`.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "offset is bounded by max_lookahead before the cast"
)]
pub fn trend_next_event(
    line: &TrendLine,
    threshold: f64,
    max_lookahead: Duration,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if line.slope_per_sec >= 0.0 {
        return None;
    }
    let current = line.value_at(now);
    if current <= threshold {
        return Some(now);
    }
    let secs = (threshold - current) / line.slope_per_sec;
    if !secs.is_finite() || secs > max_lookahead.num_seconds() as f64 {
        return None;
    }
    Some(now + Duration::seconds(secs.round() as i64))
}

/// Points every `step` from `now`, confidence fading linearly to the horizon
#[expect(
    clippy::cast_precision_loss,
    clippy::integer_division,
    reason = "point counts are small and the horizon is a whole number of steps"
)]
pub fn forecast(
    line: &TrendLine,
    now: DateTime<Utc>,
    step: Duration,
    horizon: Duration,
) -> Vec<ProjectedPoint> {
    let step_secs = step.num_seconds().max(1);
    let n = (horizon.num_seconds() / step_secs).max(1);
    (0..n)
        .map(|i| {
            let timestamp = now + Duration::seconds(i * step_secs);
            ProjectedPoint {
                timestamp,
                value: line.value_at(timestamp),
                confidence: 1.0 - i as f64 / n as f64,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct ProjectionEngine<'a> {
    config: &'a EngineConfig,
}

impl<'a> ProjectionEngine<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Forecast one series over `horizon`.
    ///
    /// Lack of history and a trend that never reaches the threshold are
    /// reported through the result status. Only store failures are errors.
    #[expect(clippy::integer_division, reason = "bucket count in the lookback")]
    pub fn project<S: SeriesStore + ?Sized>(
        &self,
        store: &S,
        entity_id: &str,
        metric: Metric,
        horizon: ProjectionHorizon,
        now: DateTime<Utc>,
    ) -> EngineResult<ProjectionResult> {
        let settings = self.config.projections.settings(horizon);
        let Some(width) = self.config.granularities.bucket_width(settings.granularity) else {
            return Ok(ProjectionResult::insufficient_data());
        };

        let lookback = settings.lookback();
        let wanted = usize::try_from(lookback.num_seconds() / width.num_seconds().max(1))
            .unwrap_or(usize::MAX)
            .saturating_add(1);
        let window_start = now - lookback;
        let samples: Vec<(DateTime<Utc>, f64)> = store
            .latest_sealed_buckets(entity_id, metric, settings.granularity, wanted)?
            .iter()
            .filter(|b| b.bucket_start >= window_start)
            .filter_map(|b| Some((b.bucket_start + width / 2, b.average()?)))
            .collect();

        let Some(line) = TrendLine::fit(&samples) else {
            debug!(
                entity_id,
                %metric,
                horizon = horizon.as_str(),
                buckets = samples.len(),
                "Not enough sealed history to project"
            );
            return Ok(ProjectionResult::insufficient_data());
        };

        let points = forecast(&line, now, width, settings.horizon());

        if !metric.is_soil_moisture() {
            return Ok(ProjectionResult {
                points,
                next_event: None,
                status: ProjectionStatus::Ok,
            });
        }

        let (next_event, status) = match self.config.watering.policy {
            ProjectionPolicy::FixedInterval { interval } => {
                let last = store
                    .latest_watering_event(entity_id)?
                    .map(|event| event.timestamp);
                (
                    fixed_interval_next_event(last, interval),
                    ProjectionStatus::Ok,
                )
            }
            ProjectionPolicy::Trend {
                threshold,
                max_lookahead,
            } => match trend_next_event(&line, threshold, max_lookahead, now) {
                Some(at) => (Some(at), ProjectionStatus::Ok),
                None => (None, ProjectionStatus::NoCrossing),
            },
        };

        Ok(ProjectionResult {
            points,
            next_event,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]

    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use plantguru_types::{AggregateBucket, Granularity, WateringEvent};

    const PLANT: &str = "plant-12";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 2, 18, 0, 0).unwrap()
    }

    fn hourly(store: &MemoryStore, metric: Metric, hours_ago: i64, value: f64) {
        store
            .upsert_bucket(&AggregateBucket {
                entity_id: PLANT.to_owned(),
                metric,
                granularity: Granularity::Hour1,
                bucket_start: now() - Duration::hours(hours_ago),
                count: 12,
                sum: value * 12.0,
                min: value,
                max: value,
                sealed: true,
                partial: false,
            })
            .unwrap();
    }

    /// 24 hourly buckets falling linearly from 60 to 40
    fn falling_day(store: &MemoryStore) {
        for i in 0..24 {
            hourly(store, Metric::SoilMoisture1, 24 - i, 60.0 - 20.0 * i as f64 / 23.0);
        }
    }

    #[test]
    fn test_falling_moisture_crosses_threshold() {
        let mut config = EngineConfig::default();
        config.watering.policy = ProjectionPolicy::Trend {
            threshold: 30.0,
            max_lookahead: Duration::days(30),
        };
        let store = MemoryStore::new();
        falling_day(&store);

        let result = ProjectionEngine::new(&config)
            .project(&store, PLANT, Metric::SoilMoisture1, ProjectionHorizon::Day, now())
            .unwrap();

        assert_eq!(result.status, ProjectionStatus::Ok);
        // The first bucket midpoint is 23.5h ago and the line loses 20/23 per
        // hour, so 30 is reached 34.5h after it
        let expected = now() + Duration::hours(11);
        let next = result.next_event.unwrap();
        assert!((next - expected).num_seconds().abs() <= 1, "got {next}");
    }

    #[test]
    fn test_flat_history_never_crosses() {
        let config = EngineConfig::default();
        let store = MemoryStore::new();
        for hours_ago in 1..=24 {
            hourly(&store, Metric::SoilMoisture1, hours_ago, 50.0);
        }

        let result = ProjectionEngine::new(&config)
            .project(&store, PLANT, Metric::SoilMoisture1, ProjectionHorizon::Day, now())
            .unwrap();

        assert_eq!(result.status, ProjectionStatus::NoCrossing);
        assert_eq!(result.next_event, None);
        assert!(result.points.iter().all(|p| p.value == 50.0));
    }

    #[test]
    fn test_single_bucket_is_insufficient() {
        let config = EngineConfig::default();
        let store = MemoryStore::new();
        hourly(&store, Metric::SoilMoisture1, 3, 45.0);
        // Outside the 24h lookback
        hourly(&store, Metric::SoilMoisture1, 40, 55.0);

        let result = ProjectionEngine::new(&config)
            .project(&store, PLANT, Metric::SoilMoisture1, ProjectionHorizon::Day, now())
            .unwrap();

        assert_eq!(result, ProjectionResult::insufficient_data());
    }

    #[test]
    fn test_open_buckets_are_ignored() {
        let config = EngineConfig::default();
        let store = MemoryStore::new();
        hourly(&store, Metric::SoilMoisture1, 3, 45.0);
        store
            .upsert_bucket(&AggregateBucket {
                entity_id: PLANT.to_owned(),
                metric: Metric::SoilMoisture1,
                granularity: Granularity::Hour1,
                bucket_start: now() - Duration::hours(1),
                count: 3,
                sum: 120.0,
                min: 40.0,
                max: 40.0,
                sealed: false,
                partial: false,
            })
            .unwrap();

        let result = ProjectionEngine::new(&config)
            .project(&store, PLANT, Metric::SoilMoisture1, ProjectionHorizon::Day, now())
            .unwrap();
        assert_eq!(result.status, ProjectionStatus::InsufficientData);
    }

    #[test]
    fn test_forecast_points_span_the_horizon() {
        let config = EngineConfig::default();
        let store = MemoryStore::new();
        falling_day(&store);

        let result = ProjectionEngine::new(&config)
            .project(&store, PLANT, Metric::SoilMoisture1, ProjectionHorizon::Day, now())
            .unwrap();

        assert_eq!(result.points.len(), 24);
        assert_eq!(result.points[0].timestamp, now());
        assert_eq!(result.points[0].confidence, 1.0);
        assert_eq!(result.points[23].timestamp, now() + Duration::hours(23));
        assert!(result.points.windows(2).all(|w| {
            w[0].value > w[1].value && w[0].confidence > w[1].confidence
        }));
    }

    #[test]
    fn test_fixed_interval_uses_last_watering() {
        let mut config = EngineConfig::default();
        config.watering.policy = ProjectionPolicy::FixedInterval {
            interval: Duration::hours(72),
        };
        let store = MemoryStore::new();
        falling_day(&store);
        let engine = ProjectionEngine::new(&config);

        let before = engine
            .project(&store, PLANT, Metric::SoilMoisture1, ProjectionHorizon::Day, now())
            .unwrap();
        assert_eq!(before.status, ProjectionStatus::Ok);
        assert_eq!(before.next_event, None);

        store
            .insert_watering_event(&WateringEvent {
                entity_id: PLANT.to_owned(),
                timestamp: now() - Duration::hours(10),
                moisture_before: 25.0,
                moisture_after: 60.0,
            })
            .unwrap();
        let after = engine
            .project(&store, PLANT, Metric::SoilMoisture1, ProjectionHorizon::Day, now())
            .unwrap();
        assert_eq!(after.next_event, Some(now() + Duration::hours(62)));
    }

    #[test]
    fn test_other_metrics_have_no_next_event() {
        let config = EngineConfig::default();
        let store = MemoryStore::new();
        for hours_ago in 1..=5 {
            hourly(&store, Metric::Light, hours_ago, 100.0 - hours_ago as f64);
        }

        let result = ProjectionEngine::new(&config)
            .project(&store, PLANT, Metric::Light, ProjectionHorizon::Day, now())
            .unwrap();
        assert_eq!(result.status, ProjectionStatus::Ok);
        assert_eq!(result.next_event, None);
        assert!(!result.points.is_empty());
    }

    #[test]
    fn test_trend_policy_edges() {
        let falling = TrendLine {
            origin: now(),
            intercept: 35.0,
            slope_per_sec: -1.0 / 3600.0,
        };
        // Already below
        assert_eq!(trend_next_event(&falling, 40.0, Duration::days(30), now()), Some(now()));
        // Five hours out
        assert_eq!(
            trend_next_event(&falling, 30.0, Duration::days(30), now()),
            Some(now() + Duration::hours(5))
        );
        // Beyond the lookahead
        assert_eq!(trend_next_event(&falling, 30.0, Duration::hours(4), now()), None);

        let rising = TrendLine {
            slope_per_sec: 0.001,
            ..falling
        };
        assert_eq!(trend_next_event(&rising, 30.0, Duration::days(30), now()), None);
    }

    #[test]
    fn test_fit_recovers_exact_line() {
        let samples: Vec<_> = (0..5)
            .map(|i| (now() + Duration::seconds(i * 100), 10.0 + 0.5 * i as f64))
            .collect();
        let line = TrendLine::fit(&samples).unwrap();
        assert!((line.slope_per_sec - 0.005).abs() < 1e-12);
        assert!((line.value_at(now()) - 10.0).abs() < 1e-9);
        assert!(TrendLine::fit(&samples[..1]).is_none());
        assert_eq!(fixed_interval_next_event(None, Duration::hours(1)), None);
    }
}
