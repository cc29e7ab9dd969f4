//! Simple test harness for the recommendation engine.
//!
//! Loads the dataset and the model, then prints recommendations for one
//! user. Usage: `server [config.json] [user_id]`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use data_loader::{Catalog, DataIndex, RatingStore, RawId};
use server::{EngineConfig, RecommendationEngine};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,server=debug,pipeline=debug")),
        )
        .init();

    info!("Starting ReelRecs server test harness");

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::from_file(Path::new(&path))?,
        None => EngineConfig::default(),
    };
    let user_id = args.next().map(|s| RawId::parse(&s)).unwrap_or(RawId::Int(1));

    info!("Loading data index from {}...", config.data_dir.display());
    let data_index = Arc::new(
        DataIndex::load_from_files(&config.data_dir, config.scale)
            .context("Failed to load dataset")?,
    );
    let (movies, users, ratings) = data_index.counts();
    info!(movies, users, ratings, "Data index loaded");

    let catalog: Arc<dyn Catalog> = data_index.clone();
    let rating_store: Arc<dyn RatingStore> = data_index.clone();
    let engine = RecommendationEngine::from_config(&config, catalog, rating_store)?;
    info!("Engine ready ({})", engine.scorer_name());

    let limit = 20;
    let recommendations = engine
        .recommend_async(user_id.clone(), limit, Vec::new(), 1.0)
        .await?;

    info!("Received {} recommendations for user {}:", recommendations.len(), user_id);
    for (i, rec) in recommendations.iter().enumerate() {
        let genres: Vec<&str> = rec.genres.iter().map(|g| g.label()).collect();
        info!("{}. {} - Score: {:.3}", i + 1, rec.title, rec.svd_score);
        info!("   Genres: {}", genres.join(", "));
    }

    Ok(())
}
