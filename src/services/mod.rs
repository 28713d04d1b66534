pub mod aggregator;
pub mod loader;
pub mod pairs;
pub mod quality;
pub mod query;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

pub use aggregator::{aggregate, aggregate_parallel, PairAggregate, SimilarityTable};
pub use loader::{load_movies, load_ratings, MovieCatalog};
pub use pairs::{RatingsByUser, UserRatings};
pub use quality::filter_by_average;
pub use query::{QueryEngine, QueryOptions};

use crate::{error::AppResult, models::Rating};

/// Runs the batch stages between loading and querying
///
/// 1. Drop ratings of movies averaging below `min_average_rating`
/// 2. Group ratings by user
/// 3. Fold every user's rating pairs across `workers` partitions
/// 4. Finalise scores once all partials are merged
///
/// Setting `cancelled` abandons stage 3 with `AppError::Cancelled`.
pub async fn compute_similarities(
    ratings: Vec<Rating>,
    min_average_rating: f64,
    workers: usize,
    cancelled: Arc<AtomicBool>,
) -> AppResult<SimilarityTable> {
    let start = Instant::now();

    let ratings = filter_by_average(ratings, min_average_rating);
    let users = Arc::new(RatingsByUser::from_ratings(&ratings));
    drop(ratings);

    let aggregate = aggregate_parallel(users, workers, cancelled).await?;
    let table = aggregate.finalize();

    tracing::info!(
        pairs = table.len(),
        scored_pairs = table.scored_len(),
        elapsed_ms = start.elapsed().as_millis(),
        "Similarity table built"
    );

    Ok(table)
}
