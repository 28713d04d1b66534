use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{MovieId, SimilarMovie},
    services::{aggregator::SimilarityTable, loader::MovieCatalog},
};

/// Thresholds and size limit for a similar-movies query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Maximum number of results
    pub limit: usize,
    /// Minimum number of co-rating users
    pub min_strength: u32,
    /// Minimum cosine score
    pub min_score: f64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_strength: 50,
            min_score: 0.97,
        }
    }
}

/// Answers top-N similar-movie queries over a finalised table
pub struct QueryEngine<'a> {
    table: &'a SimilarityTable,
    catalog: &'a MovieCatalog,
}

impl<'a> QueryEngine<'a> {
    pub fn new(table: &'a SimilarityTable, catalog: &'a MovieCatalog) -> Self {
        Self { table, catalog }
    }

    /// Finds the movies most similar to `movie_id`.
    ///
    /// Results are ordered by score descending, then strength descending,
    /// then movie id ascending. Pairs without a defined score never qualify.
    ///
    /// Fails with `InvalidInput` when the movie is not in the catalog and
    /// with `NotFound` when it is, but no pair passes the thresholds.
    pub fn similar_movies(
        &self,
        movie_id: MovieId,
        options: &QueryOptions,
    ) -> AppResult<Vec<SimilarMovie>> {
        let Some(movie) = self.catalog.get(movie_id) else {
            return Err(AppError::InvalidInput(format!(
                "Movie id {} is not in the catalog.",
                movie_id
            )));
        };

        let mut matches: Vec<SimilarMovie> = self
            .table
            .for_movie(movie_id)
            .filter(|result| result.strength >= options.min_strength)
            .filter_map(|result| {
                let score = result.score.filter(|s| *s >= options.min_score)?;
                let other = result.key.other(movie_id)?;
                Some(SimilarMovie {
                    movie_id: other,
                    title: self.title_of(other),
                    score,
                    strength: result.strength,
                })
            })
            .collect();

        tracing::debug!(
            movie_id,
            candidates = self.table.for_movie(movie_id).count(),
            qualifying = matches.len(),
            "Similar movie candidates filtered"
        );

        if matches.is_empty() {
            return Err(AppError::NotFound(format!(
                "no movies similar to '{}' pass the thresholds (strength >= {}, score >= {})",
                movie.title, options.min_strength, options.min_score
            )));
        }

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.strength.cmp(&a.strength))
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });
        matches.truncate(options.limit);

        Ok(matches)
    }

    pub fn title_of(&self, movie_id: MovieId) -> String {
        self.catalog
            .title(movie_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("<unknown movie {}>", movie_id))
    }
}
