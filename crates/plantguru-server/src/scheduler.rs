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

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use plantguru_core::{RollupEngine, RollupSummary, SeriesStore};
use plantguru_types::EngineConfig;

use crate::db::Database;

pub fn spawn_rollup_task(
    db: Arc<Database>,
    engine: Arc<EngineConfig>,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        info!(interval_secs, "Rollup task started");

        loop {
            interval.tick().await;
            run_rollup_pass(db.as_ref(), &engine, Utc::now());
        }
    })
}

/// Roll up every known series once. A failing series is logged and left for
/// the next pass; the others still run.
pub fn run_rollup_pass<S: SeriesStore + ?Sized>(
    store: &S,
    engine: &EngineConfig,
    now: DateTime<Utc>,
) -> RollupSummary {
    let series = match store.list_series() {
        Ok(series) => series,
        Err(e) => {
            error!(error = %e, "Rollup: failed to list series");
            return RollupSummary::default();
        }
    };

    let rollup = RollupEngine::new(engine, store);
    let mut total = RollupSummary::default();
    for (entity_id, metric) in &series {
        match rollup.run_pass(entity_id, *metric, now) {
            Ok(summary) => total += summary,
            Err(e) => {
                error!(entity_id = %entity_id, metric = %metric, error = %e, "Rollup pass failed");
            }
        }
    }
    total
}

pub fn spawn_cleanup_task(
    db: Arc<Database>,
    retention_days: u32,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match cleanup_raw(db.as_ref(), retention_days, Utc::now()) {
                Ok(deleted) if deleted > 0 => {
                    info!(deleted, "Cleaned up old raw readings");
                }
                Err(e) => {
                    error!(error = %e, "Failed to clean up old raw readings");
                }
                Ok(_) => {}
            }
        }
    })
}

/// Delete raw readings older than the retention window. Buckets are kept.
pub fn cleanup_raw<S: SeriesStore + ?Sized>(
    store: &S,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Result<u64> {
    store.delete_raw_before(now - Duration::days(i64::from(retention_days)))
}
