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

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::granularity::Granularity;
use crate::metric::Metric;

/// A single sensor sample as ingested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub entity_id: String,
    pub metric: Metric,
    /// UTC, whole seconds
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Pre-aggregated statistics for one fixed-width window.
///
/// Unique per `(entity_id, metric, granularity, bucket_start)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBucket {
    pub entity_id: String,
    pub metric: Metric,
    pub granularity: Granularity,
    pub bucket_start: DateTime<Utc>,
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    /// Window elapsed; no longer recomputed by scheduled passes
    pub sealed: bool,
    /// Some contributing finer data was missing
    pub partial: bool,
}

impl AggregateBucket {
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn bucket_end(&self, width: Duration) -> DateTime<Utc> {
        self.bucket_start + width
    }
}

/// One element of a stitched multi-resolution series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub granularity: Granularity,
    pub partial: bool,
    /// Open bucket that may still change
    pub provisional: bool,
}

impl SeriesPoint {
    pub fn from_reading(reading: &RawReading) -> Self {
        Self {
            timestamp: reading.timestamp,
            value: reading.value,
            granularity: Granularity::Raw,
            partial: false,
            provisional: false,
        }
    }

    pub fn from_bucket(bucket: &AggregateBucket) -> Option<Self> {
        Some(Self {
            timestamp: bucket.bucket_start,
            value: bucket.average()?,
            granularity: bucket.granularity,
            partial: bucket.partial,
            provisional: !bucket.sealed,
        })
    }
}

/// A detected watering, inferred from a jump in soil moisture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WateringEvent {
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub moisture_before: f64,
    pub moisture_after: f64,
}
