//! Service error types
//!
//! Every operation in `tools` reports one of these. The HTTP layer turns
//! them into status codes and a generic message.

use thiserror::Error;

use crate::db::DbError;
use crate::suggest::GenerationError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Suggestion is missing required fields: {}", .0.join(", "))]
    IncompleteSuggestion(Vec<&'static str>),

    #[error("Text generation failed: {0}")]
    GenerationFailed(#[from] GenerationError),

    #[error("Fetching reference content failed: {0}")]
    FetchFailed(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] DbError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn batch_not_found(id: i64) -> Self {
        AppError::NotFound { entity: "Batch", id }
    }

    pub fn url_not_found(id: i64) -> Self {
        AppError::NotFound { entity: "URL", id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(AppError::batch_not_found(4).to_string(), "Batch 4 not found");
        assert_eq!(
            AppError::IncompleteSuggestion(vec!["ice", "name"]).to_string(),
            "Suggestion is missing required fields: ice, name"
        );
    }
}
