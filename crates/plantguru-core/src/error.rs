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
use thiserror::Error;

use plantguru_types::Granularity;

/// Failures surfaced by the engine components.
///
/// Projection outcomes such as "not enough data" are not errors; they are
/// reported through [`ProjectionStatus`](plantguru_types::ProjectionStatus).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid range: start {start} must be before end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Range of {requested_days} days exceeds the maximum of {max_days} days")]
    RangeTooLarge { requested_days: i64, max_days: i64 },

    #[error("{0} is not a rollup target")]
    NotRollupTarget(Granularity),

    #[error("Rollup window is empty: {start} .. {end}")]
    EmptyWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Rollup window ends at {window_end}, after the settled limit {settled_until}")]
    WindowNotSettled {
        window_end: DateTime<Utc>,
        settled_until: DateTime<Utc>,
    },

    #[error("Series store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Caller mistakes that must not be retried
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
