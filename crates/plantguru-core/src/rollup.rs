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

//! Chained rollup of raw readings into ever coarser buckets.
//!
//! RAW feeds 5m, 5m feeds 15m and so on up the fixed chain in the granularity
//! table. Only the 5m level ever looks at raw readings. Each bucket is
//! recomputed in full from its sources on every run, so running the same
//! window twice writes identical rows.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::AddAssign;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use plantguru_types::{AggregateBucket, EngineConfig, Granularity, Metric};

use crate::error::{EngineError, EngineResult};
use crate::store::SeriesStore;

/// Counts of buckets touched by a rollup call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollupSummary {
    pub written: usize,
    pub sealed: usize,
    pub partial: usize,
}

impl AddAssign for RollupSummary {
    fn add_assign(&mut self, other: Self) {
        self.written += other.written;
        self.sealed += other.sealed;
        self.partial += other.partial;
    }
}

/// Running min/max/sum over one target bucket
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    sources: u64,
    any_partial: bool,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sources: 0,
            any_partial: false,
        }
    }

    fn add_reading(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sources += 1;
    }

    fn add_bucket(&mut self, bucket: &AggregateBucket) {
        self.count += bucket.count;
        self.sum += bucket.sum;
        self.min = self.min.min(bucket.min);
        self.max = self.max.max(bucket.max);
        self.sources += 1;
        self.any_partial |= bucket.partial;
    }
}

/// Maintains aggregate buckets for one store
#[derive(Debug)]
pub struct RollupEngine<'a, S: SeriesStore + ?Sized> {
    config: &'a EngineConfig,
    store: &'a S,
}

impl<'a, S: SeriesStore + ?Sized> RollupEngine<'a, S> {
    pub fn new(config: &'a EngineConfig, store: &'a S) -> Self {
        Self { config, store }
    }

    /// Recompute every `granularity` bucket overlapping
    /// `[window_start, window_end)` from the next finer level.
    ///
    /// `window_end` may not be later than `now - grace_period`. Buckets whose
    /// window (plus grace) has elapsed are written sealed; the rest are
    /// written open and will be recomputed by later calls.
    #[expect(clippy::integer_division, reason = "widths are whole multiples")]
    pub fn rollup_interval(
        &self,
        entity_id: &str,
        metric: Metric,
        granularity: Granularity,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EngineResult<RollupSummary> {
        let table = &self.config.granularities;
        let (Some(width), Some(source)) = (table.bucket_width(granularity), table.source(granularity))
        else {
            return Err(EngineError::NotRollupTarget(granularity));
        };
        if window_start >= window_end {
            return Err(EngineError::EmptyWindow {
                start: window_start,
                end: window_end,
            });
        }
        let settled_until = now - self.config.grace_period;
        if window_end > settled_until {
            return Err(EngineError::WindowNotSettled {
                window_end,
                settled_until,
            });
        }

        let first = table.bucket_start(granularity, window_start);
        let span_end = table.bucket_start(granularity, window_end - Duration::seconds(1)) + width;

        let mut targets: BTreeMap<DateTime<Utc>, Accumulator> = BTreeMap::new();
        // A bucket may only seal once every source bucket inside it has sealed
        let mut waiting_on_open_source: BTreeSet<DateTime<Utc>> = BTreeSet::new();

        let expected_sources = if source.is_raw() {
            let cadence = self.config.raw_cadence.num_seconds().max(1);
            (width.num_seconds() / cadence).max(1)
        } else {
            let source_width = table.bucket_width(source).map_or(1, |w| w.num_seconds().max(1));
            width.num_seconds() / source_width
        };

        if source.is_raw() {
            for reading in self.store.read_raw(entity_id, metric, first, span_end)? {
                let start = table.bucket_start(granularity, reading.timestamp);
                targets
                    .entry(start)
                    .or_insert_with(Accumulator::new)
                    .add_reading(reading.value);
            }
        } else {
            for bucket in self
                .store
                .read_buckets(entity_id, metric, source, first, span_end)?
            {
                let start = table.bucket_start(granularity, bucket.bucket_start);
                if bucket.sealed {
                    targets
                        .entry(start)
                        .or_insert_with(Accumulator::new)
                        .add_bucket(&bucket);
                } else {
                    waiting_on_open_source.insert(start);
                }
            }
        }

        let mut summary = RollupSummary::default();
        for (bucket_start, acc) in targets {
            let elapsed = bucket_start + width + self.config.grace_period <= now;
            let sealed = elapsed && !waiting_on_open_source.contains(&bucket_start);
            let partial = acc.any_partial || i64::try_from(acc.sources).unwrap_or(i64::MAX) < expected_sources;

            let bucket = AggregateBucket {
                entity_id: entity_id.to_owned(),
                metric,
                granularity,
                bucket_start,
                count: acc.count,
                sum: acc.sum,
                min: acc.min,
                max: acc.max,
                sealed,
                partial,
            };
            self.store.upsert_bucket(&bucket)?;

            debug!(
                entity_id,
                %metric,
                %granularity,
                %bucket_start,
                count = bucket.count,
                sealed,
                partial,
                "Bucket rolled up"
            );

            summary.written += 1;
            summary.sealed += usize::from(sealed);
            summary.partial += usize::from(partial);
        }

        Ok(summary)
    }

    /// Bring every level of one series up to date, finest first.
    ///
    /// Each level resumes right after its newest sealed bucket, or from
    /// `catch_up` ago when nothing has been sealed yet.
    pub fn run_pass(
        &self,
        entity_id: &str,
        metric: Metric,
        now: DateTime<Utc>,
    ) -> EngineResult<RollupSummary> {
        let table = &self.config.granularities;
        let settled_until = now - self.config.grace_period;
        let mut total = RollupSummary::default();

        for level in table.rollup_chain() {
            let granularity = level.granularity;
            let Some(width) = table.bucket_width(granularity) else {
                continue;
            };

            let resume_from = self
                .store
                .latest_sealed_buckets(entity_id, metric, granularity, 1)?
                .last()
                .map(|b| b.bucket_end(width));
            let window_start = resume_from
                .unwrap_or_else(|| settled_until - self.config.catch_up.max(width * 2));

            if window_start >= settled_until {
                continue;
            }

            total += self.rollup_interval(
                entity_id,
                metric,
                granularity,
                window_start,
                settled_until,
                now,
            )?;
        }

        if total.written > 0 {
            info!(
                entity_id,
                %metric,
                written = total.written,
                sealed = total.sealed,
                partial = total.partial,
                "Rollup pass complete"
            );
        }

        Ok(total)
    }
}
