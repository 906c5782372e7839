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

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use plantguru_core::{
    EngineError, ProjectionEngine, RangePlanner, RollupEngine, SeriesStore, ingest_reading,
};
use plantguru_shared::query::{ProjectionQuery, ProjectionResponse, SeriesPointResponse, SeriesQuery};
use plantguru_shared::readings::{IngestResponse, ReadingBatch, ReadingUpload};
use plantguru_shared::rollup::{RollupRequest, RollupResponse};
use plantguru_types::{EngineConfig, RawReading, WateringSettings};

use crate::db::Database;
use crate::error::{engine_error_response, error_response, rejection_response};

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub engine: Arc<EngineConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/readings", post(readings_handler))
        .route("/api/series", get(series_handler))
        .route("/api/projection", get(projection_handler))
        .route("/api/rollup", post(rollup_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A batch cut short by a store failure
#[derive(Debug)]
pub struct BatchFailure {
    /// Values stored before the failure
    pub accepted: usize,
    pub error: EngineError,
}

/// Store every metric value of every upload in order, stopping at the first
/// store failure.
pub fn ingest_batch<S: SeriesStore + ?Sized>(
    store: &S,
    watering: &WateringSettings,
    uploads: &[ReadingUpload],
) -> Result<IngestResponse, BatchFailure> {
    let mut response = IngestResponse {
        accepted: 0,
        watering_events: 0,
    };
    for upload in uploads {
        for (metric, value) in upload.values() {
            let reading = RawReading {
                entity_id: upload.entity_id.clone(),
                metric,
                timestamp: upload.timestamp,
                value,
            };
            match ingest_reading(store, watering, reading) {
                Ok(event) => {
                    response.accepted += 1;
                    response.watering_events += usize::from(event.is_some());
                }
                Err(error) => {
                    return Err(BatchFailure {
                        accepted: response.accepted,
                        error,
                    });
                }
            }
        }
    }
    Ok(response)
}

#[expect(clippy::unused_async, reason = "axum handler must be async")]
pub async fn readings_handler(
    State(state): State<AppState>,
    payload: Result<Json<ReadingBatch>, JsonRejection>,
) -> Response {
    let Json(batch) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection.status(), rejection.body_text()),
    };

    let uploads = batch.into_uploads();
    if uploads.iter().any(|u| u.entity_id.trim().is_empty()) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "entity_id must not be empty",
        );
    }

    let response = match ingest_batch(state.db.as_ref(), &state.engine.watering, &uploads) {
        Ok(response) => response,
        Err(failure) => {
            // Values before the failure stay stored; re-posting the batch replaces them
            warn!(
                uploads = uploads.len(),
                accepted = failure.accepted,
                "Reading batch stopped by store failure"
            );
            return engine_error_response(&failure.error);
        }
    };

    info!(
        uploads = uploads.len(),
        accepted = response.accepted,
        watering_events = response.watering_events,
        "Readings ingested"
    );

    (StatusCode::OK, Json(response)).into_response()
}

#[expect(clippy::unused_async, reason = "axum handler must be async")]
pub async fn series_handler(
    State(state): State<AppState>,
    query: Result<Query<SeriesQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return rejection_response(rejection.status(), rejection.body_text()),
    };

    let planner = RangePlanner::new(&state.engine);
    match planner.fetch_series(
        state.db.as_ref(),
        &query.entity_id,
        query.metric,
        query.start,
        query.end,
        Utc::now(),
    ) {
        Ok(points) => {
            debug!(
                entity_id = %query.entity_id,
                metric = %query.metric,
                points = points.len(),
                "Series served"
            );
            let body: Vec<SeriesPointResponse> =
                points.iter().map(SeriesPointResponse::from).collect();
            Json(body).into_response()
        }
        Err(e) => engine_error_response(&e),
    }
}

#[expect(clippy::unused_async, reason = "axum handler must be async")]
pub async fn projection_handler(
    State(state): State<AppState>,
    query: Result<Query<ProjectionQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return rejection_response(rejection.status(), rejection.body_text()),
    };

    let engine = ProjectionEngine::new(&state.engine);
    match engine.project(
        state.db.as_ref(),
        &query.entity_id,
        query.metric,
        query.horizon,
        Utc::now(),
    ) {
        Ok(result) => {
            debug!(
                entity_id = %query.entity_id,
                metric = %query.metric,
                horizon = query.horizon.as_str(),
                status = result.status.as_str(),
                "Projection served"
            );
            Json(ProjectionResponse::from(result)).into_response()
        }
        Err(e) => engine_error_response(&e),
    }
}

#[expect(clippy::unused_async, reason = "axum handler must be async")]
pub async fn rollup_handler(
    State(state): State<AppState>,
    payload: Result<Json<RollupRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection.status(), rejection.body_text()),
    };

    let engine = RollupEngine::new(&state.engine, state.db.as_ref());
    match engine.rollup_interval(
        &request.entity_id,
        request.metric,
        request.granularity,
        request.start,
        request.end,
        Utc::now(),
    ) {
        Ok(summary) => {
            info!(
                entity_id = %request.entity_id,
                metric = %request.metric,
                granularity = %request.granularity,
                written = summary.written,
                sealed = summary.sealed,
                "On-demand rollup complete"
            );
            Json(RollupResponse {
                written: summary.written,
                sealed: summary.sealed,
                partial: summary.partial,
            })
            .into_response()
        }
        Err(e) => engine_error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{Result, bail};
    use chrono::{DateTime, Duration, TimeZone};
    use plantguru_core::MemoryStore;
    use plantguru_types::{AggregateBucket, Granularity, Metric, WateringEvent};

    /// Accepts a fixed number of raw inserts, then fails like a full disk
    struct FailingStore {
        inner: MemoryStore,
        inserts_left: AtomicUsize,
    }

    impl FailingStore {
        fn new(inserts: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                inserts_left: AtomicUsize::new(inserts),
            }
        }
    }

    impl SeriesStore for FailingStore {
        fn insert_raw(&self, reading: &RawReading) -> Result<()> {
            if self
                .inserts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
            {
                bail!("disk full");
            }
            self.inner.insert_raw(reading)
        }

        fn upsert_bucket(&self, bucket: &AggregateBucket) -> Result<()> {
            self.inner.upsert_bucket(bucket)
        }

        fn read_raw(
            &self,
            entity_id: &str,
            metric: Metric,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<RawReading>> {
            self.inner.read_raw(entity_id, metric, start, end)
        }

        fn read_buckets(
            &self,
            entity_id: &str,
            metric: Metric,
            granularity: Granularity,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<AggregateBucket>> {
            self.inner.read_buckets(entity_id, metric, granularity, start, end)
        }

        fn latest_sealed_buckets(
            &self,
            entity_id: &str,
            metric: Metric,
            granularity: Granularity,
            n: usize,
        ) -> Result<Vec<AggregateBucket>> {
            self.inner.latest_sealed_buckets(entity_id, metric, granularity, n)
        }

        fn list_series(&self) -> Result<Vec<(String, Metric)>> {
            self.inner.list_series()
        }

        fn latest_raw_before(
            &self,
            entity_id: &str,
            metric: Metric,
            before: DateTime<Utc>,
        ) -> Result<Option<RawReading>> {
            self.inner.latest_raw_before(entity_id, metric, before)
        }

        fn insert_watering_event(&self, event: &WateringEvent) -> Result<()> {
            self.inner.insert_watering_event(event)
        }

        fn latest_watering_event(&self, entity_id: &str) -> Result<Option<WateringEvent>> {
            self.inner.latest_watering_event(entity_id)
        }

        fn delete_raw_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
            self.inner.delete_raw_before(cutoff)
        }
    }

    fn upload(minute: i64) -> ReadingUpload {
        ReadingUpload {
            entity_id: "plant-7".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minute),
            ext_temp: None,
            soil_temp: None,
            humidity: Some(50.0),
            light: Some(300.0),
            soil_moisture_1: None,
            soil_moisture_2: None,
        }
    }

    #[test]
    fn test_batch_counts_every_value() {
        let store = MemoryStore::new();
        let response =
            ingest_batch(&store, &WateringSettings::default(), &[upload(0), upload(5)]).unwrap();
        assert_eq!(response.accepted, 4);
        assert_eq!(response.watering_events, 0);
    }

    #[test]
    fn test_store_failure_reports_values_already_stored() {
        let store = FailingStore::new(3);
        let failure = ingest_batch(&store, &WateringSettings::default(), &[upload(0), upload(5)])
            .unwrap_err();

        assert_eq!(failure.accepted, 3);
        assert!(matches!(failure.error, EngineError::Store(_)));
        assert_eq!(store.list_series().unwrap().len(), 2);
    }
}
