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

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plantguru_server::api::{self, AppState};
use plantguru_server::config::ServerConfig;
use plantguru_server::db::Database;
use plantguru_server::scheduler;

#[derive(Debug, Parser)]
#[command(name = "plantguru-server")]
#[command(about = "Multi-resolution plant sensor series and projection server", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "server_config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("plantguru_server=info,plantguru_core=info")),
        )
        .init();

    let cli = Cli::parse();
    info!(path = %cli.config, "Loading configuration");
    let config = ServerConfig::from_file(&cli.config)?;
    let engine = Arc::new(config.engine_config()?);

    let db = Arc::new(Database::open(&config.database.path)?);
    info!(path = %config.database.path, "Database opened");

    scheduler::spawn_rollup_task(Arc::clone(&db), Arc::clone(&engine), config.rollup.interval_secs);
    scheduler::spawn_cleanup_task(
        Arc::clone(&db),
        config.database.raw_retention_days,
        config.database.cleanup_interval_secs,
    );

    let app = api::router(AppState { db, engine });

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("PlantGuru Server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
