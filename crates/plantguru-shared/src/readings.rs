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

use plantguru_types::Metric;

/// One device upload. Every sensor field is optional because devices only
/// report the probes they have fitted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadingUpload {
    #[serde(alias = "plant_id")]
    pub entity_id: String,
    #[serde(alias = "time_stamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ext_temp: Option<f64>,
    #[serde(default)]
    pub soil_temp: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub light: Option<f64>,
    #[serde(default)]
    pub soil_moisture_1: Option<f64>,
    #[serde(default)]
    pub soil_moisture_2: Option<f64>,
}

impl ReadingUpload {
    /// Metric values present in this upload
    pub fn values(&self) -> Vec<(Metric, f64)> {
        [
            (Metric::ExtTemp, self.ext_temp),
            (Metric::SoilTemp, self.soil_temp),
            (Metric::Humidity, self.humidity),
            (Metric::Light, self.light),
            (Metric::SoilMoisture1, self.soil_moisture_1),
            (Metric::SoilMoisture2, self.soil_moisture_2),
        ]
        .into_iter()
        .filter_map(|(metric, value)| Some((metric, value?)))
        .collect()
    }
}

/// Devices post either a single upload or a backlog batch
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ReadingBatch {
    Many(Vec<ReadingUpload>),
    One(ReadingUpload),
}

impl ReadingBatch {
    pub fn into_uploads(self) -> Vec<ReadingUpload> {
        match self {
            Self::Many(uploads) => uploads,
            Self::One(upload) => vec![upload],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestResponse {
    /// Number of individual metric values stored
    pub accepted: usize,
    /// Watering events detected while ingesting
    pub watering_events: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_device_field_names() {
        let batch: ReadingBatch = serde_json::from_str(
            r#"{"plant_id": "10", "time_stamp": "2025-05-01T12:00:00Z", "soil_moisture_1": 42.5}"#,
        )
        .unwrap();
        let uploads = batch.into_uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].entity_id, "10");
        assert_eq!(uploads[0].soil_moisture_1, Some(42.5));
        assert_eq!(uploads[0].light, None);
        assert_eq!(uploads[0].values(), vec![(Metric::SoilMoisture1, 42.5)]);
    }

    #[test]
    fn test_accepts_batches() {
        let batch: ReadingBatch = serde_json::from_str(
            r#"[{"entity_id": "a", "timestamp": "2025-05-01T12:00:00Z", "light": 300.0},
                {"entity_id": "a", "timestamp": "2025-05-01T12:05:00Z", "light": 310.0}]"#,
        )
        .unwrap();
        assert_eq!(batch.into_uploads().len(), 2);
    }
}
