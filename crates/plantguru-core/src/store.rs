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

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use plantguru_types::{AggregateBucket, Granularity, Metric, RawReading, WateringEvent};

/// Persistence boundary for readings, buckets and watering events.
///
/// All reads are half-open `[start, end)` and return rows in ascending time
/// order. `upsert_bucket` must replace the whole row atomically so a reader
/// never observes a half-written aggregate.
pub trait SeriesStore: Send + Sync {
    fn insert_raw(&self, reading: &RawReading) -> Result<()>;

    fn upsert_bucket(&self, bucket: &AggregateBucket) -> Result<()>;

    fn read_raw(
        &self,
        entity_id: &str,
        metric: Metric,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawReading>>;

    fn read_buckets(
        &self,
        entity_id: &str,
        metric: Metric,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AggregateBucket>>;

    /// The `n` most recent sealed buckets, oldest first
    fn latest_sealed_buckets(
        &self,
        entity_id: &str,
        metric: Metric,
        granularity: Granularity,
        n: usize,
    ) -> Result<Vec<AggregateBucket>>;

    /// Every `(entity, metric)` pair with at least one raw reading
    fn list_series(&self) -> Result<Vec<(String, Metric)>>;

    /// Most recent reading strictly before `before`
    fn latest_raw_before(
        &self,
        entity_id: &str,
        metric: Metric,
        before: DateTime<Utc>,
    ) -> Result<Option<RawReading>>;

    fn insert_watering_event(&self, event: &WateringEvent) -> Result<()>;

    fn latest_watering_event(&self, entity_id: &str) -> Result<Option<WateringEvent>>;

    /// Drop raw readings older than `cutoff`, returning how many went
    fn delete_raw_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

type SeriesKey = (String, Metric);
type BucketKey = (String, Metric, Granularity);

#[derive(Debug, Default)]
struct MemoryInner {
    raw: BTreeMap<SeriesKey, BTreeMap<DateTime<Utc>, f64>>,
    buckets: BTreeMap<BucketKey, BTreeMap<DateTime<Utc>, AggregateBucket>>,
    watering: BTreeMap<String, Vec<WateringEvent>>,
}

/// In-process store used by tests and single-node tooling
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail, as a database outage would
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("memory store marked unavailable");
        }
        Ok(())
    }

    /// Number of buckets held for one series and level
    pub fn bucket_count(&self, entity_id: &str, metric: Metric, granularity: Granularity) -> usize {
        self.inner
            .lock()
            .buckets
            .get(&(entity_id.to_owned(), metric, granularity))
            .map_or(0, BTreeMap::len)
    }
}

impl SeriesStore for MemoryStore {
    fn insert_raw(&self, reading: &RawReading) -> Result<()> {
        self.check()?;
        self.inner
            .lock()
            .raw
            .entry((reading.entity_id.clone(), reading.metric))
            .or_default()
            .insert(reading.timestamp, reading.value);
        Ok(())
    }

    fn upsert_bucket(&self, bucket: &AggregateBucket) -> Result<()> {
        self.check()?;
        self.inner
            .lock()
            .buckets
            .entry((bucket.entity_id.clone(), bucket.metric, bucket.granularity))
            .or_default()
            .insert(bucket.bucket_start, bucket.clone());
        Ok(())
    }

    fn read_raw(
        &self,
        entity_id: &str,
        metric: Metric,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawReading>> {
        self.check()?;
        if start >= end {
            return Ok(Vec::new());
        }
        let inner = self.inner.lock();
        let Some(series) = inner.raw.get(&(entity_id.to_owned(), metric)) else {
            return Ok(Vec::new());
        };
        Ok(series
            .range(start..end)
            .map(|(timestamp, value)| RawReading {
                entity_id: entity_id.to_owned(),
                metric,
                timestamp: *timestamp,
                value: *value,
            })
            .collect())
    }

    fn read_buckets(
        &self,
        entity_id: &str,
        metric: Metric,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AggregateBucket>> {
        self.check()?;
        if start >= end {
            return Ok(Vec::new());
        }
        let inner = self.inner.lock();
        Ok(inner
            .buckets
            .get(&(entity_id.to_owned(), metric, granularity))
            .map(|level| level.range(start..end).map(|(_, b)| b.clone()).collect())
            .unwrap_or_default())
    }

    fn latest_sealed_buckets(
        &self,
        entity_id: &str,
        metric: Metric,
        granularity: Granularity,
        n: usize,
    ) -> Result<Vec<AggregateBucket>> {
        self.check()?;
        let inner = self.inner.lock();
        let mut latest: Vec<AggregateBucket> = inner
            .buckets
            .get(&(entity_id.to_owned(), metric, granularity))
            .map(|level| {
                level
                    .values()
                    .rev()
                    .filter(|b| b.sealed)
                    .take(n)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        latest.reverse();
        Ok(latest)
    }

    fn list_series(&self) -> Result<Vec<(String, Metric)>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .raw
            .iter()
            .filter(|(_, readings)| !readings.is_empty())
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn latest_raw_before(
        &self,
        entity_id: &str,
        metric: Metric,
        before: DateTime<Utc>,
    ) -> Result<Option<RawReading>> {
        self.check()?;
        let inner = self.inner.lock();
        Ok(inner
            .raw
            .get(&(entity_id.to_owned(), metric))
            .and_then(|series| series.range(..before).next_back())
            .map(|(timestamp, value)| RawReading {
                entity_id: entity_id.to_owned(),
                metric,
                timestamp: *timestamp,
                value: *value,
            }))
    }

    fn insert_watering_event(&self, event: &WateringEvent) -> Result<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        let events = inner.watering.entry(event.entity_id.clone()).or_default();
        events.push(event.clone());
        events.sort_by_key(|e| e.timestamp);
        Ok(())
    }

    fn latest_watering_event(&self, entity_id: &str) -> Result<Option<WateringEvent>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .watering
            .get(entity_id)
            .and_then(|events| events.last().cloned()))
    }

    fn delete_raw_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.check()?;
        let mut inner = self.inner.lock();
        let mut deleted = 0u64;
        for series in inner.raw.values_mut() {
            let keep = series.split_off(&cutoff);
            deleted += series.len() as u64;
            *series = keep;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn reading(minute: i64, value: f64) -> RawReading {
        RawReading {
            entity_id: "plant-1".to_owned(),
            metric: Metric::Humidity,
            timestamp: t(minute),
            value,
        }
    }

    #[test]
    fn test_raw_reads_are_half_open_and_ordered() {
        let store = MemoryStore::new();
        for (minute, value) in [(10, 3.0), (0, 1.0), (5, 2.0)] {
            store.insert_raw(&reading(minute, value)).unwrap();
        }
        let rows = store.read_raw("plant-1", Metric::Humidity, t(0), t(10)).unwrap();
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_latest_raw_before_is_strict() {
        let store = MemoryStore::new();
        store.insert_raw(&reading(0, 1.0)).unwrap();
        store.insert_raw(&reading(5, 2.0)).unwrap();
        let prev = store
            .latest_raw_before("plant-1", Metric::Humidity, t(5))
            .unwrap()
            .unwrap();
        assert_eq!(prev.timestamp, t(0));
    }

    #[test]
    fn test_delete_raw_before_keeps_newer_rows() {
        let store = MemoryStore::new();
        for minute in 0..6 {
            store.insert_raw(&reading(minute, 1.0)).unwrap();
        }
        assert_eq!(store.delete_raw_before(t(4)).unwrap(), 4);
        let rows = store.read_raw("plant-1", Metric::Humidity, t(0), t(60)).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_cleaned_up_series_drops_out_of_listing() {
        let store = MemoryStore::new();
        store.insert_raw(&reading(0, 1.0)).unwrap();
        assert_eq!(
            store.list_series().unwrap(),
            vec![("plant-1".to_owned(), Metric::Humidity)]
        );
        store.delete_raw_before(t(1)).unwrap();
        assert!(store.list_series().unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.insert_raw(&reading(0, 1.0)).is_err());
        assert!(store.list_series().is_err());
        store.set_unavailable(false);
        assert!(store.list_series().unwrap().is_empty());
    }
}
