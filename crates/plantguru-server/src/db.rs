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

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

use plantguru_core::SeriesStore;
use plantguru_types::{AggregateBucket, Granularity, Metric, RawReading, WateringEvent};

/// SQLite-backed series store. Timestamps are stored as Unix seconds.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<rusqlite::Connection>,
}

type BucketRow = (String, String, String, i64, i64, f64, f64, f64, bool, bool);

fn to_datetime(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).with_context(|| format!("Timestamp out of range: {secs}"))
}

fn parse_bucket(row: BucketRow) -> Result<AggregateBucket> {
    let (entity_id, metric, granularity, start, count, sum, min, max, sealed, partial) = row;
    Ok(AggregateBucket {
        entity_id,
        metric: metric.parse()?,
        granularity: granularity.parse()?,
        bucket_start: to_datetime(start)?,
        count: u64::try_from(count).context("Negative bucket count")?,
        sum,
        min,
        max,
        sealed,
        partial,
    })
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = rusqlite::Connection::open(path)
            .with_context(|| format!("Failed to open database: {path}"))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS raw_readings (
                entity_id      TEXT NOT NULL,
                metric         TEXT NOT NULL,
                ts             INTEGER NOT NULL,
                value          REAL NOT NULL,
                PRIMARY KEY (entity_id, metric, ts)
            );

            CREATE TABLE IF NOT EXISTS buckets (
                entity_id      TEXT NOT NULL,
                metric         TEXT NOT NULL,
                granularity    TEXT NOT NULL,
                bucket_start   INTEGER NOT NULL,
                count          INTEGER NOT NULL,
                sum            REAL NOT NULL,
                min            REAL NOT NULL,
                max            REAL NOT NULL,
                sealed         INTEGER NOT NULL DEFAULT 0,
                partial        INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (entity_id, metric, granularity, bucket_start)
            );

            CREATE TABLE IF NOT EXISTS watering_events (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id       TEXT NOT NULL,
                ts              INTEGER NOT NULL,
                moisture_before REAL NOT NULL,
                moisture_after  REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_raw_ts ON raw_readings(ts);

            CREATE INDEX IF NOT EXISTS idx_watering_entity_time
                ON watering_events(entity_id, ts DESC);",
        )
        .context("Failed to initialize database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn raw_count(&self) -> Result<u64> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM raw_readings", [], |row| row.get(0))?;
        Ok(u64::try_from(count)?)
    }

    fn query_buckets(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<AggregateBucket>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                ))
            })?
            .collect::<Result<Vec<BucketRow>, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(parse_bucket).collect()
    }
}

impl SeriesStore for Database {
    fn insert_raw(&self, reading: &RawReading) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO raw_readings (entity_id, metric, ts, value) VALUES (?1, ?2, ?3, ?4)",
            params![
                reading.entity_id,
                reading.metric.as_str(),
                reading.timestamp.timestamp(),
                reading.value
            ],
        )?;
        Ok(())
    }

    fn upsert_bucket(&self, bucket: &AggregateBucket) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let count = i64::try_from(bucket.count).context("Bucket count overflows SQLite INTEGER")?;
        conn.execute(
            "INSERT INTO buckets (entity_id, metric, granularity, bucket_start, count, sum, min, max, sealed, partial)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(entity_id, metric, granularity, bucket_start) DO UPDATE SET
                count = excluded.count,
                sum = excluded.sum,
                min = excluded.min,
                max = excluded.max,
                sealed = excluded.sealed,
                partial = excluded.partial",
            params![
                bucket.entity_id,
                bucket.metric.as_str(),
                bucket.granularity.as_str(),
                bucket.bucket_start.timestamp(),
                count,
                bucket.sum,
                bucket.min,
                bucket.max,
                bucket.sealed,
                bucket.partial
            ],
        )?;
        Ok(())
    }

    fn read_raw(
        &self,
        entity_id: &str,
        metric: Metric,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawReading>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT ts, value FROM raw_readings
             WHERE entity_id = ?1 AND metric = ?2 AND ts >= ?3 AND ts < ?4
             ORDER BY ts ASC",
        )?;
        let rows = stmt
            .query_map(
                params![entity_id, metric.as_str(), start.timestamp(), end.timestamp()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(ts, value)| {
                Ok(RawReading {
                    entity_id: entity_id.to_owned(),
                    metric,
                    timestamp: to_datetime(ts)?,
                    value,
                })
            })
            .collect()
    }

    fn read_buckets(
        &self,
        entity_id: &str,
        metric: Metric,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AggregateBucket>> {
        self.query_buckets(
            "SELECT entity_id, metric, granularity, bucket_start, count, sum, min, max, sealed, partial
             FROM buckets
             WHERE entity_id = ?1 AND metric = ?2 AND granularity = ?3
               AND bucket_start >= ?4 AND bucket_start < ?5
             ORDER BY bucket_start ASC",
            params![
                entity_id,
                metric.as_str(),
                granularity.as_str(),
                start.timestamp(),
                end.timestamp()
            ],
        )
    }

    fn latest_sealed_buckets(
        &self,
        entity_id: &str,
        metric: Metric,
        granularity: Granularity,
        n: usize,
    ) -> Result<Vec<AggregateBucket>> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let mut latest = self.query_buckets(
            "SELECT entity_id, metric, granularity, bucket_start, count, sum, min, max, sealed, partial
             FROM buckets
             WHERE entity_id = ?1 AND metric = ?2 AND granularity = ?3 AND sealed = 1
             ORDER BY bucket_start DESC
             LIMIT ?4",
            params![entity_id, metric.as_str(), granularity.as_str(), limit],
        )?;
        latest.reverse();
        Ok(latest)
    }

    fn list_series(&self) -> Result<Vec<(String, Metric)>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT DISTINCT entity_id, metric FROM raw_readings ORDER BY entity_id, metric",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(entity_id, metric)| Ok((entity_id, metric.parse()?)))
            .collect()
    }

    fn latest_raw_before(
        &self,
        entity_id: &str,
        metric: Metric,
        before: DateTime<Utc>,
    ) -> Result<Option<RawReading>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let row: Option<(i64, f64)> = conn
            .query_row(
                "SELECT ts, value FROM raw_readings
                 WHERE entity_id = ?1 AND metric = ?2 AND ts < ?3
                 ORDER BY ts DESC LIMIT 1",
                params![entity_id, metric.as_str(), before.timestamp()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(ts, value)| {
            Ok(RawReading {
                entity_id: entity_id.to_owned(),
                metric,
                timestamp: to_datetime(ts)?,
                value,
            })
        })
        .transpose()
    }

    fn insert_watering_event(&self, event: &WateringEvent) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute(
            "INSERT INTO watering_events (entity_id, ts, moisture_before, moisture_after)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.entity_id,
                event.timestamp.timestamp(),
                event.moisture_before,
                event.moisture_after
            ],
        )?;
        Ok(())
    }

    fn latest_watering_event(&self, entity_id: &str) -> Result<Option<WateringEvent>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let row: Option<(i64, f64, f64)> = conn
            .query_row(
                "SELECT ts, moisture_before, moisture_after FROM watering_events
                 WHERE entity_id = ?1 ORDER BY ts DESC LIMIT 1",
                params![entity_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(ts, moisture_before, moisture_after)| {
            Ok(WateringEvent {
                entity_id: entity_id.to_owned(),
                timestamp: to_datetime(ts)?,
                moisture_before,
                moisture_after,
            })
        })
        .transpose()
    }

    fn delete_raw_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let deleted = conn.execute(
            "DELETE FROM raw_readings WHERE ts < ?1",
            params![cutoff.timestamp()],
        )?;
        Ok(u64::try_from(deleted)?)
    }
}
