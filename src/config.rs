use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::services::QueryOptions;

/// Prefix shared by every environment variable the tool reads
pub const ENV_PREFIX: &str = "MOVIESIM_";

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Ratings file (userId, movieId, rating, timestamp per line)
    #[serde(default = "default_ratings_path")]
    pub ratings_path: PathBuf,

    /// Movie metadata file (movieId, title, ... per line)
    #[serde(default = "default_movies_path")]
    pub movies_path: PathBuf,

    #[serde(default = "default_rating_delimiter")]
    pub rating_delimiter: String,

    #[serde(default = "default_movie_delimiter")]
    pub movie_delimiter: String,

    /// Minimum number of co-rating users for a pair to be reported
    #[serde(default = "default_min_strength")]
    pub min_strength: u32,

    /// Minimum cosine score for a pair to be reported
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Maximum number of similar movies per query
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    /// Movies averaging below this rating are dropped before pairing (0 disables)
    #[serde(default = "default_min_average_rating")]
    pub min_average_rating: f64,

    /// Number of partitions aggregated concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_ratings_path() -> PathBuf {
    PathBuf::from("ml-100k/u.data")
}

fn default_movies_path() -> PathBuf {
    PathBuf::from("ml-100k/u.item")
}

fn default_rating_delimiter() -> String {
    "\t".to_string()
}

fn default_movie_delimiter() -> String {
    "|".to_string()
}

fn default_min_strength() -> u32 {
    50
}

fn default_min_score() -> f64 {
    0.97
}

fn default_result_limit() -> usize {
    10
}

fn default_min_average_rating() -> f64 {
    3.0
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ratings_path: default_ratings_path(),
            movies_path: default_movies_path(),
            rating_delimiter: default_rating_delimiter(),
            movie_delimiter: default_movie_delimiter(),
            min_strength: default_min_strength(),
            min_score: default_min_score(),
            result_limit: default_result_limit(),
            min_average_rating: default_min_average_rating(),
            workers: default_workers(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::prefixed(ENV_PREFIX)
            .from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Load configuration from an explicit set of variables
    pub fn from_vars<I>(vars: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .map_err(|e| AppError::Config(e.to_string()))
    }

    /// Rejects settings the pipeline cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.rating_delimiter.is_empty() || self.movie_delimiter.is_empty() {
            return Err(AppError::Config("delimiters must not be empty".to_string()));
        }
        if self.result_limit == 0 {
            return Err(AppError::Config("result_limit must be at least 1".to_string()));
        }
        if self.workers == 0 {
            return Err(AppError::Config("workers must be at least 1".to_string()));
        }
        if !self.min_average_rating.is_finite() {
            return Err(AppError::Config(format!(
                "min_average_rating must be a finite number, got {}",
                self.min_average_rating
            )));
        }
        if !(-1.0..=1.0).contains(&self.min_score) {
            return Err(AppError::Config(format!(
                "min_score must lie in [-1, 1], got {}",
                self.min_score
            )));
        }
        Ok(())
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            limit: self.result_limit,
            min_strength: self.min_strength,
            min_score: self.min_score,
        }
    }
}
