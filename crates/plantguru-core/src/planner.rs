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

//! Resolution-aware range reads.
//!
//! A query range is cut into spans, one per granularity regime it crosses.
//! The youngest part of the range is read at the finest resolution its age
//! allows and older parts at progressively coarser levels, so a 90 day query
//! issues a handful of store reads and never scans raw rows older than the
//! RAW threshold.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use plantguru_types::{EngineConfig, Granularity, Metric, SeriesPoint, truncate_to_second};

use crate::error::{EngineError, EngineResult};
use crate::store::SeriesStore;

const SECONDS_PER_DAY: i64 = 86_400;

/// One store read: `[start, end)` at a single granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSpan {
    pub granularity: Granularity,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct RangePlanner<'a> {
    config: &'a EngineConfig,
}

impl<'a> RangePlanner<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Split the closed range `[start, end]` into spans, oldest first.
    ///
    /// The spans are contiguous and together cover `[start, end + 1s)`, with
    /// both ends cut to whole seconds after validation. Every boundary sits
    /// on a bucket edge of the coarser span before it.
    pub fn plan(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<PlannedSpan>> {
        self.validate(start, end)?;
        let start = truncate_to_second(start);
        let end = truncate_to_second(end);

        let table = &self.config.granularities;
        let one = Duration::seconds(1);
        let mut spans = Vec::new();
        let mut cursor = end + one;

        while cursor > start {
            let youngest = cursor - one;
            let granularity = table.granularity_for(now - youngest);
            let lower_edge = table
                .threshold(granularity)
                .map_or(start, |threshold| start.max(now - threshold));
            let span_start = lower_edge.min(youngest);

            spans.push(PlannedSpan {
                granularity,
                start: span_start,
                end: cursor,
            });
            cursor = span_start;
        }

        spans.reverse();
        Ok(self.align_boundaries(spans))
    }

    /// Push each boundary forward to the end of the last bucket the coarser
    /// span touches, so no bucket reaches into the finer span after it. A
    /// finer span swallowed this way is dropped.
    fn align_boundaries(&self, spans: Vec<PlannedSpan>) -> Vec<PlannedSpan> {
        let table = &self.config.granularities;
        let mut aligned: Vec<PlannedSpan> = Vec::with_capacity(spans.len());

        for mut span in spans {
            if let Some(previous) = aligned.last_mut() {
                let floor = table.bucket_start(previous.granularity, span.start);
                let boundary = match table.bucket_width(previous.granularity) {
                    Some(width) if floor < span.start => floor + width,
                    Some(_) | None => floor,
                };
                if boundary >= span.end {
                    previous.end = span.end;
                    continue;
                }
                previous.end = boundary;
                span.start = boundary;
            }
            aligned.push(span);
        }

        aligned
    }

    /// Read `[start, end]` for one series, stitched into a single strictly
    /// increasing sequence. Each point keeps the granularity it was read at.
    pub fn fetch_series<S: SeriesStore + ?Sized>(
        &self,
        store: &S,
        entity_id: &str,
        metric: Metric,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<SeriesPoint>> {
        let spans = self.plan(start, end, now)?;
        let table = &self.config.granularities;
        let mut points = Vec::new();

        for (i, span) in spans.iter().enumerate() {
            if span.granularity.is_raw() {
                let readings = store.read_raw(entity_id, metric, span.start, span.end)?;
                points.extend(readings.iter().map(SeriesPoint::from_reading));
            } else {
                // Only the oldest span reaches back for the bucket covering `start`
                let from = if i == 0 {
                    table.bucket_start(span.granularity, span.start)
                } else {
                    span.start
                };
                let buckets =
                    store.read_buckets(entity_id, metric, span.granularity, from, span.end)?;
                points.extend(buckets.iter().filter_map(SeriesPoint::from_bucket));
            }
        }

        // Finer points win on equal timestamps
        points.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.granularity.cmp(&b.granularity))
        });
        points.dedup_by_key(|p| p.timestamp);

        debug!(
            entity_id,
            %metric,
            spans = spans.len(),
            points = points.len(),
            "Series fetched"
        );

        Ok(points)
    }

    #[expect(clippy::integer_division, reason = "rounds up to whole days")]
    fn validate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<()> {
        if start >= end {
            return Err(EngineError::InvalidRange { start, end });
        }
        if end - start > self.config.max_range {
            let secs = (end - start).num_seconds();
            return Err(EngineError::RangeTooLarge {
                requested_days: (secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY,
                max_days: self.config.max_range.num_days(),
            });
        }
        Ok(())
    }
}
