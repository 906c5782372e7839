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

use thiserror::Error;

use crate::granularity::Granularity;

/// Malformed engine configuration. Raised once while building the immutable
/// configuration at startup and treated as fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Granularity table must list {expected} at position {position}, found {found:?}")]
    LevelOrder {
        position: usize,
        expected: Granularity,
        found: Option<Granularity>,
    },

    #[error("Granularity table has {0} levels, expected {count}", count = Granularity::ALL.len())]
    LevelCount(usize),

    #[error("RAW must have neither a bucket width nor a source level")]
    RawShape,

    #[error("{0} needs a non-zero bucket width")]
    MissingWidth(Granularity),

    #[error("{granularity} must be rolled up from a finer level, got {source_level:?}")]
    InvalidSource {
        granularity: Granularity,
        source_level: Option<Granularity>,
    },

    #[error("{granularity} width ({width} min) is not a multiple of {source_level} width ({source_width} min)")]
    WidthNotMultiple {
        granularity: Granularity,
        width: u32,
        source_level: Granularity,
        source_width: u32,
    },

    #[error("{coarser} width must be wider than {finer}")]
    NonMonotonicWidth {
        finer: Granularity,
        coarser: Granularity,
    },

    #[error("{coarser} threshold ({coarser_hours}h) must exceed {finer} threshold ({finer_hours}h)")]
    NonMonotonicThreshold {
        finer: Granularity,
        finer_hours: u32,
        coarser: Granularity,
        coarser_hours: u32,
    },

    #[error("{0} threshold must be greater than zero")]
    ZeroThreshold(Granularity),

    #[error("{0} is unbounded but is not the coarsest level; the age axis would have a gap")]
    UnboundedBeforeLast(Granularity),

    #[error("{0} is the coarsest level and must be unbounded so every age has a regime")]
    BoundedLast(Granularity),

    #[error("Projection horizon {horizon}: {reason}")]
    InvalidProjection { horizon: String, reason: String },

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },
}
