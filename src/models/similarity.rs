use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::MovieId;

/// Canonical key for an unordered pair of distinct movies.
///
/// The lower id is always stored first, so (a, b) and (b, a) map to the
/// same key and self pairs cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    movie_a: MovieId,
    movie_b: MovieId,
}

impl PairKey {
    /// Builds the canonical key for two movies, or `None` for a self pair
    pub fn new(first: MovieId, second: MovieId) -> Option<Self> {
        match first.cmp(&second) {
            std::cmp::Ordering::Less => Some(Self {
                movie_a: first,
                movie_b: second,
            }),
            std::cmp::Ordering::Greater => Some(Self {
                movie_a: second,
                movie_b: first,
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn movie_a(&self) -> MovieId {
        self.movie_a
    }

    pub fn movie_b(&self) -> MovieId {
        self.movie_b
    }

    pub fn contains(&self, movie_id: MovieId) -> bool {
        self.movie_a == movie_id || self.movie_b == movie_id
    }

    /// The partner of `movie_id` in this pair, if `movie_id` is part of it
    pub fn other(&self, movie_id: MovieId) -> Option<MovieId> {
        if movie_id == self.movie_a {
            Some(self.movie_b)
        } else if movie_id == self.movie_b {
            Some(self.movie_a)
        } else {
            None
        }
    }
}

impl Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.movie_a, self.movie_b)
    }
}

/// One user's ratings for both movies of a pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingPair {
    pub key: PairKey,
    /// Rating of `key.movie_a()`
    pub rating_a: f64,
    /// Rating of `key.movie_b()`
    pub rating_b: f64,
}

/// Running sums for one movie pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairStats {
    pub sum_dot: f64,
    pub sum_sq_a: f64,
    pub sum_sq_b: f64,
    pub count: u32,
}

impl PairStats {
    /// Folds one co-occurrence into the sums
    pub fn observe(&mut self, rating_a: f64, rating_b: f64) {
        self.sum_dot += rating_a * rating_b;
        self.sum_sq_a += rating_a * rating_a;
        self.sum_sq_b += rating_b * rating_b;
        self.count += 1;
    }

    /// Adds another partial aggregate for the same key
    pub fn merge(&mut self, other: &PairStats) {
        self.sum_dot += other.sum_dot;
        self.sum_sq_a += other.sum_sq_a;
        self.sum_sq_b += other.sum_sq_b;
        self.count += other.count;
    }

    /// Cosine similarity, or `None` when either side has a zero norm
    pub fn score(&self) -> Option<f64> {
        if self.sum_sq_a == 0.0 || self.sum_sq_b == 0.0 {
            return None;
        }
        let score = self.sum_dot / (self.sum_sq_a.sqrt() * self.sum_sq_b.sqrt());
        if score.is_nan() {
            return None;
        }
        Some(score.clamp(-1.0, 1.0))
    }
}

/// Finalised similarity for one movie pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityResult {
    pub key: PairKey,
    /// `None` when the score is undefined; such pairs are never ranked
    pub score: Option<f64>,
    /// Number of users who rated both movies
    pub strength: u32,
}

impl SimilarityResult {
    pub fn from_stats(key: PairKey, stats: &PairStats) -> Self {
        Self {
            key,
            score: stats.score(),
            strength: stats.count,
        }
    }
}

/// A query result row, resolved to the partner movie's title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarMovie {
    pub movie_id: MovieId,
    pub title: String,
    pub score: f64,
    pub strength: u32,
}
