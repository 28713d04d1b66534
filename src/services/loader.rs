use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use chrono::DateTime;

use crate::{
    error::{AppError, AppResult},
    models::{Movie, MovieId, Rating},
};

/// Read-only lookup table of movie metadata
#[derive(Debug, Clone, Default)]
pub struct MovieCatalog {
    movies: HashMap<MovieId, Movie>,
}

impl MovieCatalog {
    /// Builds a catalog, rejecting duplicate ids
    #[cfg(test)]
    pub fn from_movies(movies: impl IntoIterator<Item = Movie>) -> AppResult<Self> {
        let mut catalog = Self::default();
        for movie in movies {
            let movie_id = movie.movie_id;
            if catalog.movies.insert(movie_id, movie).is_some() {
                return Err(AppError::InvalidInput(format!(
                    "duplicate movie id {}",
                    movie_id
                )));
            }
        }
        Ok(catalog)
    }

    pub fn get(&self, movie_id: MovieId) -> Option<&Movie> {
        self.movies.get(&movie_id)
    }

    pub fn title(&self, movie_id: MovieId) -> Option<&str> {
        self.movies.get(&movie_id).map(|m| m.title.as_str())
    }

    pub fn contains(&self, movie_id: MovieId) -> bool {
        self.movies.contains_key(&movie_id)
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}

/// Loads the ratings file
pub async fn load_ratings(path: &Path, delimiter: &str) -> AppResult<Vec<Rating>> {
    let start = Instant::now();
    let bytes = tokio::fs::read(path).await?;
    let text = decode_text(bytes);
    let ratings = parse_ratings(&text, path, delimiter)?;

    tracing::info!(
        path = %path.display(),
        ratings = ratings.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "Ratings loaded"
    );

    Ok(ratings)
}

/// Loads the movie metadata file
pub async fn load_movies(path: &Path, delimiter: &str) -> AppResult<MovieCatalog> {
    let start = Instant::now();
    let bytes = tokio::fs::read(path).await?;
    let text = decode_text(bytes);
    let catalog = parse_movies(&text, path, delimiter)?;

    tracing::info!(
        path = %path.display(),
        movies = catalog.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "Movie metadata loaded"
    );

    Ok(catalog)
}

/// Decodes file contents as UTF-8, falling back to ISO-8859-1.
///
/// Every byte is a valid Latin-1 code point, so the fallback never fails.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!("Input is not valid UTF-8, decoding as ISO-8859-1");
            err.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

/// Parses rating records: `userId, movieId, rating[, timestamp]`
pub fn parse_ratings(text: &str, path: &Path, delimiter: &str) -> AppResult<Vec<Rating>> {
    let mut ratings = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        if fields.len() < 3 {
            return Err(AppError::parse(
                path,
                line_no,
                format!("expected at least 3 fields, found {}", fields.len()),
            ));
        }

        let user_id = fields[0]
            .parse()
            .map_err(|_| AppError::parse(path, line_no, format!("invalid user id '{}'", fields[0])))?;
        let movie_id = fields[1]
            .parse()
            .map_err(|_| AppError::parse(path, line_no, format!("invalid movie id '{}'", fields[1])))?;
        let rating: f64 = fields[2]
            .parse()
            .map_err(|_| AppError::parse(path, line_no, format!("invalid rating '{}'", fields[2])))?;
        if !rating.is_finite() {
            return Err(AppError::parse(
                path,
                line_no,
                format!("rating must be finite, got '{}'", fields[2]),
            ));
        }

        let rated_at = match fields.get(3).filter(|f| !f.is_empty()) {
            Some(raw) => {
                let secs: i64 = raw.parse().map_err(|_| {
                    AppError::parse(path, line_no, format!("invalid timestamp '{}'", raw))
                })?;
                let timestamp = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                    AppError::parse(path, line_no, format!("timestamp out of range '{}'", raw))
                })?;
                Some(timestamp)
            }
            None => None,
        };

        ratings.push(Rating {
            user_id,
            movie_id,
            rating,
            rated_at,
        });
    }

    Ok(ratings)
}

/// Parses movie records: `movieId, title, ...`; trailing fields are ignored
pub fn parse_movies(text: &str, path: &Path, delimiter: &str) -> AppResult<MovieCatalog> {
    let mut catalog = MovieCatalog::default();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split(delimiter);
        let raw_id = fields.next().unwrap_or_default().trim();
        let title = fields
            .next()
            .ok_or_else(|| AppError::parse(path, line_no, "missing title field"))?
            .trim();

        let movie_id: MovieId = raw_id
            .parse()
            .map_err(|_| AppError::parse(path, line_no, format!("invalid movie id '{}'", raw_id)))?;

        if catalog.contains(movie_id) {
            return Err(AppError::parse(
                path,
                line_no,
                format!("duplicate movie id {}", movie_id),
            ));
        }
        catalog.movies.insert(movie_id, Movie::new(movie_id, title));
    }

    Ok(catalog)
}
