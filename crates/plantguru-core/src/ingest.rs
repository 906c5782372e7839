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

//! Raw reading ingestion and watering detection.

use tracing::{debug, info};

use plantguru_types::{Metric, RawReading, WateringEvent, WateringSettings, truncate_to_second};

use crate::error::EngineResult;
use crate::store::SeriesStore;

/// Store one reading. A jump in the primary soil moisture probe large enough
/// to be a watering is recorded as a [`WateringEvent`] and returned, unless
/// another watering was recorded within the cooldown.
pub fn ingest_reading<S: SeriesStore + ?Sized>(
    store: &S,
    settings: &WateringSettings,
    mut reading: RawReading,
) -> EngineResult<Option<WateringEvent>> {
    reading.timestamp = truncate_to_second(reading.timestamp);

    let previous = if reading.metric == Metric::SoilMoisture1 {
        store.latest_raw_before(&reading.entity_id, reading.metric, reading.timestamp)?
    } else {
        None
    };

    store.insert_raw(&reading)?;

    let Some(previous) = previous else {
        return Ok(None);
    };
    if reading.value - previous.value < settings.detection_increase {
        return Ok(None);
    }

    if let Some(last) = store.latest_watering_event(&reading.entity_id)?
        && reading.timestamp - last.timestamp < settings.detection_cooldown
    {
        debug!(
            entity_id = %reading.entity_id,
            last_event = %last.timestamp,
            "Moisture jump inside watering cooldown, ignored"
        );
        return Ok(None);
    }

    let event = WateringEvent {
        entity_id: reading.entity_id.clone(),
        timestamp: reading.timestamp,
        moisture_before: previous.value,
        moisture_after: reading.value,
    };
    store.insert_watering_event(&event)?;

    info!(
        entity_id = %event.entity_id,
        timestamp = %event.timestamp,
        before = event.moisture_before,
        after = event.moisture_after,
        "Watering detected"
    );

    Ok(Some(event))
}
