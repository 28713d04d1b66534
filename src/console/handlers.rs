use std::fmt::Write;

use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::{MovieId, SimilarMovie},
};

use super::{AppState, OutputFormat};

/// Successful answer to one query
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub movie_id: MovieId,
    pub title: String,
    pub similar: Vec<SimilarMovie>,
}

/// Parses a raw movie id and looks up its most similar movies
pub fn similar_movies(state: &AppState, input: &str) -> AppResult<QueryResponse> {
    let input = input.trim();
    let movie_id: MovieId = input.parse().map_err(|_| {
        tracing::debug!(input, "Rejected non-numeric movie id");
        AppError::InvalidInput("Please enter a numeric movie ID.".to_string())
    })?;

    let engine = state.engine();
    let similar = engine.similar_movies(movie_id, &state.options)?;

    Ok(QueryResponse {
        movie_id,
        title: engine.title_of(movie_id),
        similar,
    })
}

/// Formats a query outcome for the console
pub fn render(outcome: &AppResult<QueryResponse>, format: OutputFormat) -> String {
    match (format, outcome) {
        (OutputFormat::Text, Ok(response)) => render_text(response),
        (OutputFormat::Text, Err(AppError::NotFound(msg))) => {
            format!("No similar movies found: {}", msg)
        }
        (OutputFormat::Text, Err(err)) => err.to_string(),
        (OutputFormat::Json, Ok(response)) => serde_json::to_string(response)
            .unwrap_or_else(|e| AppError::Internal(e.to_string()).to_json().to_string()),
        (OutputFormat::Json, Err(err)) => err.to_json().to_string(),
    }
}

fn render_text(response: &QueryResponse) -> String {
    let mut out = format!(
        "Top {} similar movies for {}:\n",
        response.similar.len(),
        response.title
    );
    for movie in &response.similar {
        // writing into a String cannot fail
        let _ = write!(
            out,
            "\n{}\tscore: {:.2}\tstrength: {}",
            movie.title, movie.score, movie.strength
        );
    }
    out
}
