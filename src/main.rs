use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use movie_similarities::{
    config::Config,
    console::{self, AppState, OutputFormat},
};

/// Find movies that the same users rated alike.
#[derive(Parser, Debug)]
#[command(name = "movie-similarities", version, about)]
struct Cli {
    /// Ratings file (userId, movieId, rating, timestamp).
    #[arg(long)]
    ratings: Option<PathBuf>,

    /// Movie metadata file (movieId, title, ...).
    #[arg(long)]
    movies: Option<PathBuf>,

    /// Answer a single query and exit instead of prompting.
    #[arg(long)]
    movie_id: Option<String>,

    /// Maximum number of similar movies to print.
    #[arg(long)]
    limit: Option<usize>,

    /// Minimum number of users who rated both movies.
    #[arg(long)]
    min_strength: Option<u32>,

    /// Minimum cosine similarity score.
    #[arg(long, allow_negative_numbers = true)]
    min_score: Option<f64>,

    /// Drop movies whose average rating is below this value (0 disables).
    #[arg(long)]
    min_average_rating: Option<f64>,

    /// Number of partitions aggregated concurrently.
    #[arg(long)]
    workers: Option<usize>,

    /// Output format.
    #[arg(long, default_value = "text")]
    format: OutputFormat,
}

impl Cli {
    /// Command line flags take precedence over environment settings
    fn apply(&self, mut config: Config) -> Config {
        if let Some(path) = &self.ratings {
            config.ratings_path = path.clone();
        }
        if let Some(path) = &self.movies {
            config.movies_path = path.clone();
        }
        if let Some(limit) = self.limit {
            config.result_limit = limit;
        }
        if let Some(min_strength) = self.min_strength {
            config.min_strength = min_strength;
        }
        if let Some(min_score) = self.min_score {
            config.min_score = min_score;
        }
        if let Some(min_average) = self.min_average_rating {
            config.min_average_rating = min_average;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.apply(Config::from_env()?);

    tracing::info!(
        ratings = %config.ratings_path.display(),
        movies = %config.movies_path.display(),
        min_strength = config.min_strength,
        min_score = config.min_score,
        workers = config.workers,
        "Starting similarity batch"
    );

    // The batch can be aborted with Ctrl-C until the first query is served.
    // The flag stops the blocking aggregation tasks, which would otherwise
    // keep the runtime from shutting down.
    let cancelled = Arc::new(AtomicBool::new(false));
    let state = tokio::select! {
        state = AppState::build(&config, Arc::clone(&cancelled)) => state?,
        _ = tokio::signal::ctrl_c() => {
            cancelled.store(true, Ordering::Relaxed);
            tracing::warn!("Batch aborted before completion");
            anyhow::bail!("interrupted while computing similarities");
        }
    };

    let mut stdout = tokio::io::stdout();

    if let Some(movie_id) = &cli.movie_id {
        return match console::run_once(&state, movie_id, cli.format, &mut stdout).await {
            Ok(()) => Ok(ExitCode::SUCCESS),
            Err(e) if e.is_recoverable() => Ok(ExitCode::FAILURE),
            Err(e) => Err(e.into()),
        };
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    console::run_interactive(&state, cli.format, stdin, &mut stdout).await?;

    Ok(ExitCode::SUCCESS)
}
