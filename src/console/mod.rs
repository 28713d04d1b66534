pub mod handlers;
pub mod state;

pub use state::AppState;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::AppResult;

const PROMPT: &str = "Enter the movie ID for which you want to find similar movies ('quit' to exit): ";

/// Inputs that end the interactive loop
const EXIT_COMMANDS: [&str; 3] = ["q", "quit", "exit"];

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Answers a single query and writes the result.
///
/// Returns the query error, if any, after it has been reported so the caller
/// can pick an exit status.
pub async fn run_once<W>(
    state: &AppState,
    input: &str,
    format: OutputFormat,
    writer: &mut W,
) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
{
    let (output, result) = answer(state, input, format);
    writer.write_all(output.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    result
}

/// Prompt-and-query loop over `reader` until EOF or an exit command.
///
/// Query errors are reported and the loop prompts again.
pub async fn run_interactive<R, W>(
    state: &AppState,
    format: OutputFormat,
    reader: R,
    writer: &mut W,
) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut served = 0usize;

    loop {
        if format == OutputFormat::Text {
            writer.write_all(PROMPT.as_bytes()).await?;
            writer.flush().await?;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&input.to_ascii_lowercase().as_str()) {
            break;
        }

        let (output, _) = answer(state, input, format);
        writer.write_all(output.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        served += 1;
    }

    tracing::info!(queries = served, "Interactive session ended");
    Ok(())
}

fn answer(state: &AppState, input: &str, format: OutputFormat) -> (String, AppResult<()>) {
    let span = tracing::info_span!("query", query_id = %Uuid::new_v4(), input = %input);
    span.in_scope(|| {
        let outcome = handlers::similar_movies(state, input);
        match &outcome {
            Ok(response) => tracing::info!(
                movie_id = response.movie_id,
                results = response.similar.len(),
                "Query answered"
            ),
            Err(e) => tracing::warn!(error = %e, "Query failed"),
        }
        let output = handlers::render(&outcome, format);
        (output, outcome.map(|_| ()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{Movie, Rating};
    use crate::services::{aggregate, MovieCatalog, QueryOptions, RatingsByUser};

    fn state() -> AppState {
        let ratings = vec![
            Rating::new(1, 1, 5.0),
            Rating::new(1, 2, 4.0),
            Rating::new(2, 1, 3.0),
            Rating::new(2, 2, 3.0),
        ];
        let table = aggregate(RatingsByUser::from_ratings(&ratings).pairs()).finalize();
        let catalog =
            MovieCatalog::from_movies(vec![Movie::new(1, "Alien (1979)"), Movie::new(2, "Aliens (1986)")])
                .unwrap();
        let options = QueryOptions {
            limit: 10,
            min_strength: 1,
            min_score: 0.0,
        };
        AppState::new(table, catalog, options)
    }

    #[tokio::test]
    async fn test_interactive_loop_keeps_going_after_errors() {
        let state = state();
        let input: &[u8] = b"abc\n999\n\n1\nquit\n2\n";
        let mut output = Vec::new();

        run_interactive(&state, OutputFormat::Text, input, &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Invalid input. Please enter a numeric movie ID."));
        assert!(text.contains("Invalid input. Movie id 999 is not in the catalog."));
        assert!(text.contains("Top 1 similar movies for Alien (1979):"));
        assert!(text.contains("Aliens (1986)\tscore: "));
        // Nothing after the exit command is answered
        assert!(!text.contains("similar movies for Aliens (1986)"));
    }

    #[tokio::test]
    async fn test_interactive_loop_stops_at_eof() {
        let state = state();
        let input: &[u8] = b"2";
        let mut output = Vec::new();

        run_interactive(&state, OutputFormat::Json, input, &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let body: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(body["title"], "Aliens (1986)");
    }

    #[tokio::test]
    async fn test_run_once_reports_and_returns_error() {
        let state = state();
        let mut output = Vec::new();

        let result = run_once(&state, "7", OutputFormat::Text, &mut output).await;

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert!(String::from_utf8(output).unwrap().starts_with("Invalid input"));
    }
}
