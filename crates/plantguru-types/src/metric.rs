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

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sensor channels reported by a plant-monitoring device.
///
/// The set is fixed; every entity reports some subset of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Air temperature next to the plant (°C)
    ExtTemp,
    /// Soil temperature (°C)
    SoilTemp,
    /// Relative air humidity (%)
    Humidity,
    /// Illuminance (lux)
    Light,
    /// Primary soil moisture probe (%)
    SoilMoisture1,
    /// Secondary soil moisture probe (%)
    SoilMoisture2,
}

impl Metric {
    pub fn all() -> &'static [Metric] {
        &[
            Self::ExtTemp,
            Self::SoilTemp,
            Self::Humidity,
            Self::Light,
            Self::SoilMoisture1,
            Self::SoilMoisture2,
        ]
    }

    /// Wire and storage name (snake_case)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtTemp => "ext_temp",
            Self::SoilTemp => "soil_temp",
            Self::Humidity => "humidity",
            Self::Light => "light",
            Self::SoilMoisture1 => "soil_moisture_1",
            Self::SoilMoisture2 => "soil_moisture_2",
        }
    }

    pub fn is_soil_moisture(&self) -> bool {
        matches!(self, Self::SoilMoisture1 | Self::SoilMoisture2)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown metric name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown metric: '{0}'")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_owned()))
    }
}
