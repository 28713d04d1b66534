use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{MovieId, PairKey, PairStats, RatingPair, SimilarityResult},
    services::pairs::{RatingsByUser, UserRatings},
};

/// Pairs folded between two checks of the cancellation flag
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Per-key running sums, possibly covering only part of the dataset.
///
/// Partials for disjoint sets of users merge by field-wise addition, so any
/// partitioning yields the same totals. Scores only exist after `finalize`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairAggregate {
    stats: HashMap<PairKey, PairStats>,
}

impl PairAggregate {
    pub fn observe(&mut self, pair: &RatingPair) {
        self.stats
            .entry(pair.key)
            .or_default()
            .observe(pair.rating_a, pair.rating_b);
    }

    /// Folds another partial aggregate into this one
    pub fn merge(&mut self, other: PairAggregate) {
        for (key, stats) in other.stats {
            self.stats.entry(key).or_default().merge(&stats);
        }
    }

    pub fn get(&self, key: &PairKey) -> Option<&PairStats> {
        self.stats.get(key)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Computes a score for every key and freezes the result
    pub fn finalize(self) -> SimilarityTable {
        let mut results: Vec<SimilarityResult> = self
            .stats
            .iter()
            .map(|(key, stats)| SimilarityResult::from_stats(*key, stats))
            .collect();
        results.sort_by_key(|r| r.key);

        let mut by_movie: HashMap<MovieId, Vec<usize>> = HashMap::new();
        for (index, result) in results.iter().enumerate() {
            by_movie.entry(result.key.movie_a()).or_default().push(index);
            by_movie.entry(result.key.movie_b()).or_default().push(index);
        }

        SimilarityTable { results, by_movie }
    }
}

/// Sequential fold of a pair stream
pub fn aggregate(pairs: impl IntoIterator<Item = RatingPair>) -> PairAggregate {
    let mut aggregate = PairAggregate::default();
    for pair in pairs {
        aggregate.observe(&pair);
    }
    aggregate
}

/// Folds a slice of users, giving up as soon as `cancelled` is set
fn aggregate_users(users: &[UserRatings], cancelled: &AtomicBool) -> Option<PairAggregate> {
    let mut aggregate = PairAggregate::default();
    let pairs = users.iter().flat_map(|user| user.pairs());
    for (index, pair) in pairs.enumerate() {
        if index % CANCEL_CHECK_INTERVAL == 0 && cancelled.load(Ordering::Relaxed) {
            return None;
        }
        aggregate.observe(&pair);
    }
    Some(aggregate)
}

/// Folds users' pairs across `workers` blocking tasks.
///
/// Each task owns a contiguous range of users. Partials are merged in
/// partition order by this task alone, so for a given worker count the
/// totals do not depend on scheduling. Different worker counts add the same
/// terms in a different order, which can change the last bits of fractional
/// sums.
///
/// Setting `cancelled` stops every task within a few thousand pairs and the
/// call fails with `AppError::Cancelled`.
pub async fn aggregate_parallel(
    users: Arc<RatingsByUser>,
    workers: usize,
    cancelled: Arc<AtomicBool>,
) -> AppResult<PairAggregate> {
    let start = Instant::now();
    let ranges = users.partition_ranges(workers);

    tracing::info!(
        users = users.user_count(),
        pairs = users.pair_count(),
        partitions = ranges.len(),
        "Aggregating rating pairs"
    );

    let mut tasks = Vec::new();

    // Spawn one blocking task per partition
    for range in ranges {
        let users = Arc::clone(&users);
        let cancelled = Arc::clone(&cancelled);
        let task = tokio::task::spawn_blocking(move || {
            aggregate_users(&users.users()[range], &cancelled)
        });
        tasks.push(task);
    }

    // Single-writer merge
    let mut merged = PairAggregate::default();
    for task in tasks {
        let partial = task
            .await
            .map_err(|e| AppError::Internal(format!("aggregation task failed: {}", e)))?;
        match partial {
            Some(partial) => merged.merge(partial),
            None => {
                tracing::warn!(
                    elapsed_ms = start.elapsed().as_millis(),
                    "Aggregation cancelled"
                );
                return Err(AppError::Cancelled(
                    "similarity aggregation was interrupted".to_string(),
                ));
            }
        }
    }

    tracing::info!(
        distinct_pairs = merged.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "Aggregation completed"
    );

    Ok(merged)
}

/// Finalised similarity scores, ordered by pair key and indexed by movie
#[derive(Debug, Clone, Default)]
pub struct SimilarityTable {
    results: Vec<SimilarityResult>,
    by_movie: HashMap<MovieId, Vec<usize>>,
}

impl SimilarityTable {
    pub fn results(&self) -> &[SimilarityResult] {
        &self.results
    }

    pub fn get(&self, key: &PairKey) -> Option<&SimilarityResult> {
        self.results
            .binary_search_by_key(key, |r| r.key)
            .ok()
            .map(|index| &self.results[index])
    }

    /// Every pair that includes `movie_id`, in key order
    pub fn for_movie(&self, movie_id: MovieId) -> impl Iterator<Item = &SimilarityResult> + '_ {
        self.by_movie
            .get(&movie_id)
            .into_iter()
            .flatten()
            .map(|&index| &self.results[index])
    }

    /// Number of pairs with a defined score
    pub fn scored_len(&self) -> usize {
        self.results.iter().filter(|r| r.score.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rating, UserId};
    use std::collections::HashSet;

    const A: MovieId = 1;
    const B: MovieId = 2;
    const C: MovieId = 3;

    fn grouped(rows: &[(UserId, MovieId, f64)]) -> RatingsByUser {
        let ratings: Vec<Rating> = rows
            .iter()
            .map(|&(user, movie, rating)| Rating::new(user, movie, rating))
            .collect();
        RatingsByUser::from_ratings(&ratings)
    }

    fn worked_example() -> RatingsByUser {
        grouped(&[(1, A, 5.0), (1, B, 5.0), (2, A, 4.0), (2, B, 5.0), (3, A, 1.0)])
    }

    #[test]
    fn test_worked_example() {
        let users = worked_example();
        let aggregate = aggregate(users.pairs());

        assert_eq!(aggregate.len(), 1);
        let key = PairKey::new(A, B).unwrap();
        let stats = aggregate.get(&key).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.sum_dot, 45.0);
        assert_eq!(stats.sum_sq_a, 41.0);
        assert_eq!(stats.sum_sq_b, 50.0);

        let table = aggregate.finalize();
        let result = table.get(&key).unwrap();
        assert_eq!(result.strength, 2);
        assert!((result.score.unwrap() - 0.994).abs() < 0.001);
    }

    #[test]
    fn test_strength_counts_distinct_users() {
        let users = grouped(&[
            (1, A, 4.0),
            (1, B, 3.0),
            (1, C, 2.0),
            (2, A, 5.0),
            (2, C, 5.0),
            (3, B, 1.0),
            (3, C, 1.0),
            (4, A, 2.0),
            (4, B, 2.0),
            (4, C, 2.0),
        ]);
        let table = aggregate(users.pairs()).finalize();

        assert_eq!(table.get(&PairKey::new(A, B).unwrap()).unwrap().strength, 2);
        assert_eq!(table.get(&PairKey::new(A, C).unwrap()).unwrap().strength, 3);
        assert_eq!(table.get(&PairKey::new(B, C).unwrap()).unwrap().strength, 3);
    }

    #[test]
    fn test_keys_canonical_and_unique() {
        let users = grouped(&[(1, C, 4.0), (1, A, 3.0), (2, A, 1.0), (2, C, 2.0), (2, B, 5.0)]);
        let table = aggregate(users.pairs()).finalize();

        let mut seen = HashSet::new();
        for result in table.results() {
            assert!(result.key.movie_a() < result.key.movie_b());
            assert!(seen.insert((result.key.movie_a(), result.key.movie_b())));
            assert!(!seen.contains(&(result.key.movie_b(), result.key.movie_a())));
        }
    }

    #[test]
    fn test_zero_norm_pairs_are_kept_but_unscored() {
        let users = grouped(&[(1, A, 0.0), (1, B, 3.0), (2, A, 4.0), (2, C, 4.0)]);
        let table = aggregate(users.pairs()).finalize();

        assert_eq!(table.len(), 2);
        assert_eq!(table.scored_len(), 1);
        let undefined = table.get(&PairKey::new(A, B).unwrap()).unwrap();
        assert_eq!(undefined.score, None);
        assert_eq!(undefined.strength, 1);
    }

    #[test]
    fn test_for_movie_lists_every_touching_pair() {
        let users = grouped(&[(1, A, 4.0), (1, B, 3.0), (1, C, 2.0)]);
        let table = aggregate(users.pairs()).finalize();

        let touching_b: Vec<PairKey> = table.for_movie(B).map(|r| r.key).collect();
        assert_eq!(
            touching_b,
            vec![PairKey::new(A, B).unwrap(), PairKey::new(B, C).unwrap()]
        );
        assert_eq!(table.for_movie(99).count(), 0);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let mut rows = Vec::new();
        for user in 1..=40u32 {
            for movie in 1..=12u32 {
                if (user + movie) % 3 != 0 {
                    rows.push((user, movie, f64::from((user * movie) % 5 + 1)));
                }
            }
        }
        let users = grouped(&rows);
        let sequential = aggregate(users.pairs());

        let shared = Arc::new(users);
        for workers in [1, 3, 8, 64] {
            let parallel = aggregate_parallel(Arc::clone(&shared), workers, Arc::default())
                .await
                .unwrap();
            assert_eq!(parallel, sequential, "workers = {}", workers);
        }
    }

    #[tokio::test]
    async fn test_parallel_on_empty_input() {
        let aggregate = aggregate_parallel(Arc::new(RatingsByUser::default()), 4, Arc::default())
            .await
            .unwrap();
        assert!(aggregate.is_empty());
        assert!(aggregate.finalize().is_empty());
    }

    #[tokio::test]
    async fn test_fractional_ratings_repeat_exactly_for_fixed_workers() {
        let mut rows = Vec::new();
        for user in 1..=30u32 {
            for movie in 1..=10u32 {
                if (user * 3 + movie) % 4 != 0 {
                    rows.push((user, movie, 0.1 + f64::from((user + movie) % 7) * 0.7));
                }
            }
        }
        let shared = Arc::new(grouped(&rows));

        for workers in [1, 4] {
            let first = aggregate_parallel(Arc::clone(&shared), workers, Arc::default())
                .await
                .unwrap();
            let second = aggregate_parallel(Arc::clone(&shared), workers, Arc::default())
                .await
                .unwrap();
            assert_eq!(first, second, "workers = {}", workers);
        }
    }

    /// One user who rated `movies` movies contributes C(movies, 2) pairs
    fn heavy_user(movies: u32) -> Arc<RatingsByUser> {
        let rows: Vec<(UserId, MovieId, f64)> =
            (1..=movies).map(|movie| (1, movie, f64::from(movie % 5 + 1))).collect();
        Arc::new(grouped(&rows))
    }

    #[tokio::test]
    async fn test_cancelled_before_start_does_no_work() {
        let cancelled = Arc::new(AtomicBool::new(true));

        let result = aggregate_parallel(heavy_user(200), 2, cancelled).await;

        assert!(matches!(result, Err(AppError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_cancel_stops_a_running_aggregation() {
        // ~720k pairs, far more than can be folded before the flag is set
        let users = heavy_user(1200);
        let cancelled = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&cancelled);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            flag.store(true, Ordering::Relaxed);
        });

        let start = Instant::now();
        let result = aggregate_parallel(users, 1, cancelled).await;

        assert!(matches!(result, Err(AppError::Cancelled(_))));
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_runtime_shuts_down_promptly_after_abort() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let cancelled = Arc::new(AtomicBool::new(false));
        let start = Instant::now();

        let aborted = runtime.block_on(async {
            tokio::select! {
                _ = aggregate_parallel(heavy_user(1200), 1, Arc::clone(&cancelled)) => false,
                _ = tokio::time::sleep(std::time::Duration::from_millis(5)) => {
                    cancelled.store(true, Ordering::Relaxed);
                    true
                }
            }
        });
        // Dropping the runtime waits for blocking tasks to return
        drop(runtime);

        assert!(aborted);
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
    }
}
