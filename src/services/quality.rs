use std::collections::HashMap;

use crate::models::{MovieId, Rating, UserId};

/// Drops every rating of a movie whose mean rating is below `min_average`.
///
/// The mean counts one rating per user, the last one in input order, which
/// is the same rating pair generation keeps. A non-positive threshold
/// disables the filter.
pub fn filter_by_average(ratings: Vec<Rating>, min_average: f64) -> Vec<Rating> {
    if min_average <= 0.0 {
        return ratings;
    }

    let mut latest: HashMap<(UserId, MovieId), f64> = HashMap::new();
    for rating in &ratings {
        latest.insert((rating.user_id, rating.movie_id), rating.rating);
    }

    let mut totals: HashMap<MovieId, (f64, u32)> = HashMap::new();
    for (&(_, movie_id), &rating) in &latest {
        let entry = totals.entry(movie_id).or_insert((0.0, 0));
        entry.0 += rating;
        entry.1 += 1;
    }

    let before = ratings.len();
    let movies_before = totals.len();
    totals.retain(|_, (sum, count)| *sum / f64::from(*count) >= min_average);

    let kept: Vec<Rating> = ratings
        .into_iter()
        .filter(|r| totals.contains_key(&r.movie_id))
        .collect();

    tracing::info!(
        min_average,
        movies_kept = totals.len(),
        movies_dropped = movies_before - totals.len(),
        ratings_dropped = before - kept.len(),
        "Filtered low-rated movies"
    );

    kept
}
