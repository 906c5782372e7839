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

//! Multi-resolution aggregation, range planning and projection over a
//! [`SeriesStore`].
//!
//! Every component here is a stateless transformer: it borrows the immutable
//! [`EngineConfig`](plantguru_types::EngineConfig) and a store for the
//! duration of one operation and keeps nothing in between.

pub mod error;
pub mod ingest;
pub mod planner;
pub mod projection;
pub mod rollup;
pub mod store;

pub use error::{EngineError, EngineResult};
pub use ingest::ingest_reading;
pub use planner::{PlannedSpan, RangePlanner};
pub use projection::{ProjectionEngine, TrendLine};
pub use rollup::{RollupEngine, RollupSummary};
pub use store::{MemoryStore, SeriesStore};
