use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{Catalog, DataIndex, Genre, RatingStore, UserId};
use factor_store::{materialize, SvdModel};
use pipeline::ScoredItem;
use server::{EngineConfig, RecommendationEngine};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// ReelRecs - Movie Recommendation Engine
#[derive(Parser)]
#[command(name = "reel-recs")]
#[command(
    about = "Movie recommendations from a latent-factor model with per-request fold-in",
    long_about = None
)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to MovieLens dataset directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Directory holding the factor artifacts
    #[arg(short, long)]
    models_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get movie recommendations for a user
    Recommend {
        /// User ID to get recommendations for
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations to return
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Genres to favour, comma separated (e.g. "Comedy,Sci-Fi")
        #[arg(long, value_delimiter = ',')]
        genres: Vec<Genre>,

        /// Weight of the rating estimate against genre coverage
        #[arg(long, default_value = "0.5")]
        alpha: f64,

        /// Show both scores for each recommendation
        #[arg(long)]
        explain: bool,

        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a user's rating history
    User {
        /// User ID to display
        #[arg(long)]
        user_id: UserId,
    },

    /// Search for movies by title or genre
    Search {
        /// Case-insensitive substring; empty lists the first catalog entries
        #[arg(long, default_value = "")]
        title: String,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },

    /// Rebuild artifacts shipped as .partNNN chunks
    Materialize {
        /// Directory to scan (defaults to the models directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Write the optimized artifacts for a trained model
    Export {
        /// Trained model file (defaults to the configured legacy model)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Output directory (defaults to the models directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.models_dir {
        config.models_dir = dir;
    }

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Recommend {
            user_id,
            limit,
            genres,
            alpha,
            explain,
            json,
        } => {
            let data_index = load_dataset(&config)?;
            handle_recommend(&config, data_index, user_id, limit, genres, alpha, explain, json)
                .await?
        }
        Commands::User { user_id } => handle_user(load_dataset(&config)?, user_id)?,
        Commands::Search { title } => handle_search(load_dataset(&config)?, title)?,
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(&config, load_dataset(&config)?, requests, concurrent).await?,
        Commands::Materialize { dir } => {
            handle_materialize(dir.unwrap_or_else(|| config.models_dir.clone()))?
        }
        Commands::Export { model, out } => handle_export(
            model.unwrap_or_else(|| config.legacy_model.clone()),
            out.unwrap_or_else(|| config.models_dir.clone()),
        )?,
    }

    Ok(())
}

/// Load data index (this may take a moment)
fn load_dataset(config: &EngineConfig) -> Result<Arc<DataIndex>> {
    println!("Loading MovieLens dataset from {}...", config.data_dir.display());
    let start = Instant::now();
    let data_index = Arc::new(
        DataIndex::load_from_files(&config.data_dir, config.scale)
            .context("Failed to load MovieLens dataset")?,
    );
    println!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());
    Ok(data_index)
}

fn build_engine(
    config: &EngineConfig,
    data_index: &Arc<DataIndex>,
) -> Result<RecommendationEngine> {
    let catalog: Arc<dyn Catalog> = data_index.clone();
    let ratings: Arc<dyn RatingStore> = data_index.clone();
    let engine = RecommendationEngine::from_config(config, catalog, ratings)?;
    println!("{} Scoring with {}", "✓".green(), engine.scorer_name());
    Ok(engine)
}

/// Handle the 'recommend' command
#[allow(clippy::too_many_arguments)]
async fn handle_recommend(
    config: &EngineConfig,
    data_index: Arc<DataIndex>,
    user_id: UserId,
    limit: usize,
    genres: Vec<Genre>,
    alpha: f64,
    explain: bool,
    json: bool,
) -> Result<()> {
    let engine = build_engine(config, &data_index)?;

    if data_index.get_user_ratings(&user_id).is_empty() {
        println!(
            "{} User {} has no ratings; ranking by item bias only",
            "!".yellow(),
            user_id
        );
    }

    let recommendations = engine.recommend_async(user_id, limit, genres, alpha).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
    } else {
        print_recommendations(&recommendations, explain);
    }
    Ok(())
}

/// Handle the 'user' command
fn handle_user(data_index: Arc<DataIndex>, user_id: UserId) -> Result<()> {
    let ratings = data_index.get_user_ratings(&user_id);
    if ratings.is_empty() {
        bail!("User {} has no ratings", user_id);
    }

    println!("{}", format!("User ID: {}", user_id).bold().blue());

    let avg_rating = ratings.iter().map(|r| r.rating).sum::<f64>() / ratings.len() as f64;
    println!("{}Number of ratings: {}", "• ".cyan(), ratings.len());
    println!("{}Average rating: {:.2}", "• ".cyan(), avg_rating);

    let mut top_rated: Vec<_> = ratings.iter().collect();
    top_rated.sort_by(|a, b| b.rating.total_cmp(&a.rating));
    println!("Top rated movies:");
    for rating in top_rated.iter().take(5) {
        if let Some(movie) = data_index.get_movie(&rating.movie_id) {
            println!("  - {} (Rating: {})", movie.title, rating.rating);
        }
    }

    // Genre preferences: mean rating per genre, best first
    let mut genre_ratings: BTreeMap<Genre, (f64, u32)> = BTreeMap::new();
    for rating in ratings {
        if let Some(movie) = data_index.get_movie(&rating.movie_id) {
            for genre in &movie.genres {
                let entry = genre_ratings.entry(*genre).or_insert((0.0, 0));
                entry.0 += rating.rating;
                entry.1 += 1;
            }
        }
    }
    let mut preferences: Vec<(Genre, f64, u32)> = genre_ratings
        .into_iter()
        .map(|(genre, (total, count))| (genre, total / count as f64, count))
        .collect();
    preferences.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.2.cmp(&a.2)));

    println!("Genre preferences:");
    for (genre, avg, count) in preferences {
        println!("  - {}: Average Rating: {:.2} ({} ratings)", genre, avg, count);
    }
    Ok(())
}

/// Handle the 'search' command
fn handle_search(data_index: Arc<DataIndex>, title: String) -> Result<()> {
    let matches = data_index.search_movies(&title);

    println!("{}", format!("Search results for '{}':", title).bold().blue());
    if matches.is_empty() {
        println!("  (no matches)");
    }
    for movie in matches.iter().take(20) {
        println!("{}: {} [{}]", movie.id, movie.title, join_genres(&movie.genres));
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    config: &EngineConfig,
    data_index: Arc<DataIndex>,
    requests: usize,
    concurrent: usize,
) -> Result<()> {
    let engine = build_engine(config, &data_index)?;

    let known_users = data_index.user_ids();
    if known_users.is_empty() {
        bail!("Dataset has no users to benchmark with");
    }
    if requests == 0 {
        bail!("Benchmark needs at least one request");
    }

    let user_ids: Vec<UserId> = (0..requests)
        .map(|_| known_users[rand::random_range(0..known_users.len())].clone())
        .collect();

    // Bound the number of in-flight requests
    let semaphore = Arc::new(Semaphore::new(concurrent.max(1)));
    let wall_clock = Instant::now();
    let mut handles = vec![];
    for user in user_ids {
        let engine = engine.clone();
        let permit = semaphore.clone().acquire_owned().await?;
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            engine.recommend_async(user, 20, Vec::new(), 1.0).await?;
            drop(permit);
            Ok::<_, anyhow::Error>(start.elapsed())
        });
        handles.push(handle);
    }

    let mut timings = vec![];
    for handle in handles {
        let elapsed = handle.await??;
        timings.push(elapsed);
    }
    let total_time = wall_clock.elapsed();

    timings.sort();
    let latency_sum: Duration = timings.iter().sum();
    let avg_latency = latency_sum / timings.len() as u32;
    let percentile = |p: f64| timings[((timings.len() as f64 * p) as usize).min(timings.len() - 1)];
    let throughput = requests as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} concurrent)", requests, concurrent.max(1));
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

/// Handle the 'materialize' command
fn handle_materialize(dir: PathBuf) -> Result<()> {
    let rebuilt = materialize::join_all_in_directory(&dir)
        .with_context(|| format!("Failed to rebuild artifacts in {}", dir.display()))?;
    println!("{} Rebuilt {} artifacts under {}", "✓".green(), rebuilt, dir.display());
    Ok(())
}

/// Handle the 'export' command
fn handle_export(model_path: PathBuf, out: PathBuf) -> Result<()> {
    let model = SvdModel::load(&model_path)
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;
    model
        .export_artifacts(&out)
        .with_context(|| format!("Failed to write artifacts to {}", out.display()))?;
    println!(
        "{} Exported {}-factor model to {}",
        "✓".green(),
        model.n_factors(),
        out.display()
    );
    Ok(())
}

fn join_genres(genres: &[Genre]) -> String {
    genres.iter().map(|g| g.label()).collect::<Vec<_>>().join(", ")
}

/// Helper function to format and print recommendations
fn print_recommendations(recommendations: &[ScoredItem], explain: bool) {
    println!("{}", "Movie Recommendations:".bold().blue());
    if recommendations.is_empty() {
        println!("  (nothing left to recommend)");
    }
    for (i, item) in recommendations.iter().enumerate() {
        let rank = i + 1;
        println!(
            "{}. {} [{}] - Score: {:.2}",
            rank.to_string().green(),
            item.title,
            join_genres(&item.genres),
            item.svd_score
        );
        if explain {
            match item.hybrid_score {
                Some(hybrid) => println!(
                    "   Predicted rating {:.3}, hybrid score {:.3}",
                    item.svd_score, hybrid
                ),
                None => println!("   Predicted rating {:.3}", item.svd_score),
            }
        }
    }
}
