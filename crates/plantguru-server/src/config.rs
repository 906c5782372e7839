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

use anyhow::{Context, Result, bail};
use chrono::Duration;
use serde::Deserialize;
use std::path::Path;

use plantguru_types::{
    ConfigError, EngineConfig, Granularity, GranularityTable, HorizonSettings, ProjectionHorizon,
    ProjectionPolicy, ProjectionTable, WateringSettings,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub rollup: RollupSettings,
    #[serde(default)]
    pub granularities: GranularitySettings,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub projection: ProjectionSettings,
    #[serde(default)]
    pub watering: WateringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_raw_retention_days")]
    pub raw_retention_days: u32,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollupSettings {
    #[serde(default = "default_rollup_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u32,
    #[serde(default = "default_raw_cadence_secs")]
    pub raw_cadence_secs: u32,
    #[serde(default = "default_catch_up_hours")]
    pub catch_up_hours: u32,
}

/// Threshold hours per level. The coarsest level (1mo) is unbounded and has
/// no entry.
#[derive(Debug, Clone, Deserialize)]
pub struct GranularitySettings {
    #[serde(default = "default_raw_hours")]
    pub raw: u32,
    #[serde(rename = "5m", default = "default_5m_hours")]
    pub minute5: u32,
    #[serde(rename = "15m", default = "default_15m_hours")]
    pub minute15: u32,
    #[serde(rename = "30m", default = "default_30m_hours")]
    pub minute30: u32,
    #[serde(rename = "1h", default = "default_1h_hours")]
    pub hour1: u32,
    #[serde(rename = "12h", default = "default_12h_hours")]
    pub hour12: u32,
    #[serde(rename = "1d", default = "default_1d_hours")]
    pub day1: u32,
    #[serde(rename = "1w", default = "default_1w_hours")]
    pub week1: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuerySettings {
    #[serde(default = "default_max_range_days")]
    pub max_range_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectionSettings {
    pub hour: HorizonSettings,
    pub twelve_hours: HorizonSettings,
    pub day: HorizonSettings,
    pub week: HorizonSettings,
    pub month: HorizonSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderMode {
    Smart,
    FixedInterval,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WateringConfig {
    #[serde(default = "default_reminder")]
    pub reminder: ReminderMode,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u32,
    #[serde(default = "default_moisture_threshold")]
    pub moisture_threshold: f64,
    #[serde(default = "default_max_lookahead_days")]
    pub max_lookahead_days: u32,
    #[serde(default = "default_detection_increase")]
    pub detection_increase: f64,
    #[serde(default = "default_detection_cooldown_hours")]
    pub detection_cooldown_hours: u32,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8200
}

fn default_db_path() -> String {
    "./data/plantguru.db".to_owned()
}

fn default_raw_retention_days() -> u32 {
    7
}

fn default_cleanup_interval_secs() -> u64 {
    86400
}

fn default_rollup_interval_secs() -> u64 {
    300
}

fn default_grace_period_secs() -> u32 {
    60
}

fn default_raw_cadence_secs() -> u32 {
    300
}

fn default_catch_up_hours() -> u32 {
    168
}

fn default_raw_hours() -> u32 {
    2
}

fn default_5m_hours() -> u32 {
    3
}

fn default_15m_hours() -> u32 {
    12
}

fn default_30m_hours() -> u32 {
    24
}

fn default_1h_hours() -> u32 {
    84
}

fn default_12h_hours() -> u32 {
    168
}

fn default_1d_hours() -> u32 {
    360
}

fn default_1w_hours() -> u32 {
    1080
}

fn default_max_range_days() -> u32 {
    90
}

fn default_reminder() -> ReminderMode {
    ReminderMode::Smart
}

fn default_interval_hours() -> u32 {
    72
}

fn default_moisture_threshold() -> f64 {
    20.0
}

fn default_max_lookahead_days() -> u32 {
    30
}

fn default_detection_increase() -> f64 {
    10.0
}

fn default_detection_cooldown_hours() -> u32 {
    24
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            raw_retention_days: default_raw_retention_days(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for RollupSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_rollup_interval_secs(),
            grace_period_secs: default_grace_period_secs(),
            raw_cadence_secs: default_raw_cadence_secs(),
            catch_up_hours: default_catch_up_hours(),
        }
    }
}

impl Default for GranularitySettings {
    fn default() -> Self {
        Self {
            raw: default_raw_hours(),
            minute5: default_5m_hours(),
            minute15: default_15m_hours(),
            minute30: default_30m_hours(),
            hour1: default_1h_hours(),
            hour12: default_12h_hours(),
            day1: default_1d_hours(),
            week1: default_1w_hours(),
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_range_days: default_max_range_days(),
        }
    }
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        let standard = ProjectionTable::standard();
        let [hour, twelve_hours, day, week, month] = *standard.entries();
        Self {
            hour,
            twelve_hours,
            day,
            week,
            month,
        }
    }
}

impl Default for WateringConfig {
    fn default() -> Self {
        Self {
            reminder: default_reminder(),
            interval_hours: default_interval_hours(),
            moisture_threshold: default_moisture_threshold(),
            max_lookahead_days: default_max_lookahead_days(),
            detection_increase: default_detection_increase(),
            detection_cooldown_hours: default_detection_cooldown_hours(),
        }
    }
}

impl GranularitySettings {
    fn threshold_hours(&self, granularity: Granularity) -> Option<u32> {
        match granularity {
            Granularity::Raw => Some(self.raw),
            Granularity::Minute5 => Some(self.minute5),
            Granularity::Minute15 => Some(self.minute15),
            Granularity::Minute30 => Some(self.minute30),
            Granularity::Hour1 => Some(self.hour1),
            Granularity::Hour12 => Some(self.hour12),
            Granularity::Day1 => Some(self.day1),
            Granularity::Week1 => Some(self.week1),
            Granularity::Month1 => None,
        }
    }

    /// Standard widths and rollup sources with the configured thresholds
    pub fn table(&self) -> Result<GranularityTable, ConfigError> {
        let levels = GranularityTable::standard()
            .levels()
            .iter()
            .map(|level| {
                let mut level = *level;
                level.threshold_hours = self.threshold_hours(level.granularity);
                level
            })
            .collect();
        GranularityTable::new(levels)
    }
}

impl ProjectionSettings {
    fn entry(&self, horizon: ProjectionHorizon) -> HorizonSettings {
        match horizon {
            ProjectionHorizon::Hour => self.hour,
            ProjectionHorizon::TwelveHours => self.twelve_hours,
            ProjectionHorizon::Day => self.day,
            ProjectionHorizon::Week => self.week,
            ProjectionHorizon::Month => self.month,
        }
    }
}

impl WateringConfig {
    fn settings(&self) -> WateringSettings {
        let policy = match self.reminder {
            ReminderMode::Smart => ProjectionPolicy::Trend {
                threshold: self.moisture_threshold,
                max_lookahead: Duration::days(i64::from(self.max_lookahead_days)),
            },
            ReminderMode::FixedInterval => ProjectionPolicy::FixedInterval {
                interval: Duration::hours(i64::from(self.interval_hours)),
            },
        };
        WateringSettings {
            policy,
            detection_increase: self.detection_increase,
            detection_cooldown: Duration::hours(i64::from(self.detection_cooldown_hours)),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Build the immutable engine configuration shared by every component
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let granularities = self.granularities.table()?;
        let projections =
            ProjectionTable::new(ProjectionHorizon::ALL.map(|h| self.projection.entry(h)), &granularities)?;

        EngineConfig {
            granularities,
            projections,
            max_range: Duration::days(i64::from(self.query.max_range_days)),
            grace_period: Duration::seconds(i64::from(self.rollup.grace_period_secs)),
            raw_cadence: Duration::seconds(i64::from(self.rollup.raw_cadence_secs)),
            catch_up: Duration::hours(i64::from(self.rollup.catch_up_hours)),
            watering: self.watering.settings(),
        }
        .validated()
    }

    fn validate(&self) -> Result<()> {
        self.engine_config()
            .context("Invalid granularity, projection or watering settings")?;
        if self.rollup.interval_secs == 0 {
            bail!("rollup.interval_secs must be positive");
        }
        if self.database.cleanup_interval_secs == 0 {
            bail!("database.cleanup_interval_secs must be positive");
        }
        // Raw rows must outlive the RAW regime and the first rollup level
        if u64::from(self.database.raw_retention_days) * 24 < u64::from(self.granularities.minute5) {
            bail!(
                "database.raw_retention_days must keep raw readings for at least {} hours",
                self.granularities.minute5
            );
        }
        Ok(())
    }
}
