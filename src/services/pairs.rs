use std::collections::BTreeMap;
use std::ops::Range;

use crate::models::{MovieId, PairKey, Rating, RatingPair, UserId};

/// All ratings of one user, sorted by movie id with one entry per movie
#[derive(Debug, Clone, PartialEq)]
pub struct UserRatings {
    pub user_id: UserId,
    pub ratings: Vec<(MovieId, f64)>,
}

impl UserRatings {
    /// Number of pairs this user contributes: k * (k - 1) / 2
    pub fn pair_count(&self) -> u64 {
        let k = self.ratings.len() as u64;
        k * k.saturating_sub(1) / 2
    }

    /// Every unordered pair of distinct movies this user rated, lower id first
    pub fn pairs(&self) -> impl Iterator<Item = RatingPair> + '_ {
        let ratings = &self.ratings;
        ratings.iter().enumerate().flat_map(move |(i, &(first, first_rating))| {
            ratings[i + 1..].iter().filter_map(move |&(second, second_rating)| {
                let key = PairKey::new(first, second)?;
                let (rating_a, rating_b) = if key.movie_a() == first {
                    (first_rating, second_rating)
                } else {
                    (second_rating, first_rating)
                };
                Some(RatingPair {
                    key,
                    rating_a,
                    rating_b,
                })
            })
        })
    }
}

/// Ratings grouped by user, ordered by user id.
///
/// Pair generation costs O(sum of k_u^2) over users, where k_u is the number
/// of movies user u rated. That is only tractable while ratings per user stay
/// bounded, which holds for MovieLens-style datasets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingsByUser {
    users: Vec<UserRatings>,
}

impl RatingsByUser {
    /// Groups ratings by user. If a user rated the same movie more than once,
    /// the last rating wins.
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        let mut grouped: BTreeMap<UserId, BTreeMap<MovieId, f64>> = BTreeMap::new();
        for rating in ratings {
            grouped
                .entry(rating.user_id)
                .or_default()
                .insert(rating.movie_id, rating.rating);
        }

        let users = grouped
            .into_iter()
            .map(|(user_id, movies)| UserRatings {
                user_id,
                ratings: movies.into_iter().collect(),
            })
            .collect();

        Self { users }
    }

    pub fn users(&self) -> &[UserRatings] {
        &self.users
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Total number of pairs `pairs()` will yield
    pub fn pair_count(&self) -> u64 {
        self.users.iter().map(UserRatings::pair_count).sum()
    }

    /// Lazily yields every user's pairs, in user order
    pub fn pairs(&self) -> impl Iterator<Item = RatingPair> + '_ {
        self.users.iter().flat_map(|user| user.pairs())
    }

    /// Splits user indices into at most `count` contiguous, non-empty ranges
    pub fn partition_ranges(&self, count: usize) -> Vec<Range<usize>> {
        let total = self.users.len();
        if total == 0 {
            return Vec::new();
        }
        let chunk_size = total.div_ceil(count.clamp(1, total));
        (0..total)
            .step_by(chunk_size)
            .map(|start| start..(start + chunk_size).min(total))
            .collect()
    }
}
