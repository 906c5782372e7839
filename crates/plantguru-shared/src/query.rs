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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plantguru_types::{
    Granularity, Metric, ProjectedPoint, ProjectionHorizon, ProjectionResult, ProjectionStatus,
    SeriesPoint,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeriesQuery {
    pub entity_id: String,
    pub metric: Metric,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[expect(clippy::trivially_copy_pass_by_ref, reason = "serde skip_serializing_if signature")]
fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeriesPointResponse {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub granularity: Granularity,
    /// Bucket built from incomplete finer data
    #[serde(default, skip_serializing_if = "is_false")]
    pub partial: bool,
    /// Bucket still open; the value may change
    #[serde(default, skip_serializing_if = "is_false")]
    pub provisional: bool,
}

impl From<&SeriesPoint> for SeriesPointResponse {
    fn from(point: &SeriesPoint) -> Self {
        Self {
            timestamp: point.timestamp,
            value: point.value,
            granularity: point.granularity,
            partial: point.partial,
            provisional: point.provisional,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectionQuery {
    pub entity_id: String,
    pub metric: Metric,
    pub horizon: ProjectionHorizon,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProjectionPointResponse {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProjectionResponse {
    pub points: Vec<ProjectionPointResponse>,
    pub next_event: Option<DateTime<Utc>>,
    pub status: ProjectionStatus,
}

impl From<&ProjectedPoint> for ProjectionPointResponse {
    fn from(point: &ProjectedPoint) -> Self {
        Self {
            timestamp: point.timestamp,
            value: point.value,
            confidence: point.confidence,
        }
    }
}

impl From<ProjectionResult> for ProjectionResponse {
    fn from(result: ProjectionResult) -> Self {
        Self {
            points: result.points.iter().map(Into::into).collect(),
            next_event: result.next_event,
            status: result.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_flags_are_omitted_when_false() {
        let point = SeriesPointResponse {
            timestamp: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
            value: 41.0,
            granularity: Granularity::Minute5,
            partial: false,
            provisional: true,
        };
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["granularity"], "5m");
        assert_eq!(json["provisional"], true);
        assert!(json.get("partial").is_none());
    }

    #[test]
    fn test_projection_status_wire_names() {
        let response = ProjectionResponse {
            points: vec![],
            next_event: None,
            status: ProjectionStatus::InsufficientData,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "insufficient_data");
        assert!(json["next_event"].is_null());
    }
}
