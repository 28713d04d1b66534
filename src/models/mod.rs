use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod similarity;

pub use similarity::{PairKey, PairStats, RatingPair, SimilarMovie, SimilarityResult};

/// Identifier of a user in the ratings dataset
pub type UserId = u32;

/// Identifier of a movie, shared by the ratings and metadata files
pub type MovieId = u32;

/// A single user's rating of a movie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub rating: f64,
    /// When the rating was recorded. Not used by the similarity computation.
    pub rated_at: Option<DateTime<Utc>>,
}

impl Rating {
    pub fn new(user_id: UserId, movie_id: MovieId, rating: f64) -> Self {
        Self {
            user_id,
            movie_id,
            rating,
            rated_at: None,
        }
    }
}

/// Movie metadata entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub movie_id: MovieId,
    pub title: String,
}

impl Movie {
    pub fn new(movie_id: MovieId, title: impl Into<String>) -> Self {
        Self {
            movie_id,
            title: title.into(),
        }
    }
}
