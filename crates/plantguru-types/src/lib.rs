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

//! Shared data model for the multi-resolution sensor series engine.

pub mod config;
pub mod error;
pub mod granularity;
pub mod metric;
pub mod projection;
pub mod series;

pub use config::{EngineConfig, WateringSettings};
pub use error::ConfigError;
pub use granularity::{Granularity, GranularityLevel, GranularityTable, truncate_to_second};
pub use metric::Metric;
pub use projection::{
    HorizonSettings, ProjectedPoint, ProjectionHorizon, ProjectionPolicy, ProjectionResult,
    ProjectionStatus, ProjectionTable,
};
pub use series::{AggregateBucket, RawReading, SeriesPoint, WateringEvent};
