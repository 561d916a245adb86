//! modelql - print the GraphQL SDL compiled from a model file

mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use modelql::{MemoryStore, SchemaBuilder, load_models};

use crate::cli::CliOptions;
use crate::config::Config;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?.with_cli(CliOptions::from_args());

    // Logs go to stderr so the SDL on stdout stays clean
    tracing_subscriber::registry()
        .with(EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let models_path = config.require_models_path()?;
    let models = load_models(models_path)?;
    tracing::info!(path = %models_path.display(), count = models.len(), "Loaded models");

    let mut builder = SchemaBuilder::new()
        .add_models(models)
        .context("Failed to compile models")?;
    if let Some(id) = &config.models_version_id {
        builder = builder.models_version_id(id.clone());
    }
    let schema = builder
        .build(Arc::new(MemoryStore::new()))
        .context("Failed to assemble schema")?;
    let sdl = schema.sdl();

    match &config.output_path {
        Some(path) => {
            std::fs::write(path, &sdl).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = sdl.len(), "Wrote schema");
        }
        None => print!("{sdl}"),
    }
    Ok(())
}
