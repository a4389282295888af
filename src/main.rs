extern crate lumagram;

use std::sync::Arc;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use log::info;

use lumagram::config::Config;
use lumagram::processes::PostPromoter;
use lumagram::services::Database;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Loading configuration");

    let config = Arc::new(
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("LUMAGRAM_"))
            .extract::<Config>()
            .context("failed to load configuration")?,
    );

    info!("Connecting to the database");

    let database = Arc::new(
        Database::connect(&config.database_url)
            .await
            .context("failed to connect to database")?,
    );

    info!("Starting everything up");

    let promoter = PostPromoter::new(database, config);

    promoter.start().await
}
