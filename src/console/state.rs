use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    config::Config,
    error::AppResult,
    services::{
        compute_similarities, load_movies, load_ratings, MovieCatalog, QueryEngine, QueryOptions,
        SimilarityTable,
    },
};

/// Read-only state shared by every query for the process lifetime
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<SimilarityTable>,
    pub catalog: Arc<MovieCatalog>,
    pub options: QueryOptions,
}

impl AppState {
    pub fn new(table: SimilarityTable, catalog: MovieCatalog, options: QueryOptions) -> Self {
        Self {
            table: Arc::new(table),
            catalog: Arc::new(catalog),
            options,
        }
    }

    /// Runs the whole batch: load both files, then build the similarity table.
    /// Any error here aborts before a single query is served.
    ///
    /// Setting `cancelled` stops the aggregation stage early.
    pub async fn build(config: &Config, cancelled: Arc<AtomicBool>) -> AppResult<Self> {
        config.validate()?;
        let start = Instant::now();

        let (ratings, catalog) = tokio::try_join!(
            load_ratings(&config.ratings_path, &config.rating_delimiter),
            load_movies(&config.movies_path, &config.movie_delimiter),
        )?;

        let table =
            compute_similarities(ratings, config.min_average_rating, config.workers, cancelled)
                .await?;

        tracing::info!(
            movies = catalog.len(),
            pairs = table.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Batch completed, ready for queries"
        );

        Ok(Self::new(table, catalog, config.query_options()))
    }

    pub fn engine(&self) -> QueryEngine<'_> {
        QueryEngine::new(&self.table, &self.catalog)
    }
}
