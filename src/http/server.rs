//! HTTP Server Implementation
//!
//! JSON API over the batch, ingredient, reference-url and status tools.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Adjacent, Batch, BatchInput, Ingredient, ReferenceUrl, UniqueIngredient};
use crate::suggest::TextGenerator;
use crate::tools::batches::{self, SuggestRequest};
use crate::tools::ingredients::{self, ConvertRequest, SuggestionQuery};
use crate::tools::status::{ServiceStatus, StatusTracker};
use crate::tools::urls::{self, AddUrlRequest};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: Database,
    pub generator: Arc<dyn TextGenerator>,
    /// Client for reference-url fetches
    pub http_client: reqwest::Client,
    pub status: Arc<StatusTracker>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        database: Database,
        generator: Arc<dyn TextGenerator>,
        database_path: PathBuf,
    ) -> Self {
        Self {
            config: Arc::new(config),
            database,
            generator,
            http_client: reqwest::Client::new(),
            status: Arc::new(StatusTracker::new(database_path)),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::IncompleteSuggestion(_)
            | AppError::GenerationFailed(_)
            | AppError::FetchFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to clients; upstream and storage details stay in the log
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(_) | AppError::NotFound { .. } => self.to_string(),
            AppError::IncompleteSuggestion(_) | AppError::GenerationFailed(_) => {
                "Failed to generate a suggestion".to_string()
            }
            AppError::FetchFailed(_) => "Failed to fetch the reference url".to_string(),
            AppError::Persistence(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status.as_u16(), self);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self);
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/batches", get(list_batches).post(create_batch))
        .route(
            "/api/batches/:id",
            get(get_batch).put(replace_batch).delete(delete_batch),
        )
        .route("/api/batches/:id/adjacent", get(adjacent_batches))
        .route("/api/batches/:id/suggest", post(suggest_batch))
        .route("/api/batches/:id/children", get(list_children))
        .route("/api/ingredients", get(suggest_ingredient_names))
        .route("/api/ingredients/convert", post(convert_measure))
        .route("/api/urls", get(list_urls).post(add_url))
        .route("/api/urls/:id", axum::routing::delete(delete_url))
        .route("/api/urls/:id/index", post(index_url))
        .route("/api/status", get(status))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ============================================================================
// Batches
// ============================================================================

async fn list_batches(State(state): State<AppState>) -> AppResult<Json<Vec<Batch>>> {
    Ok(Json(batches::list_batches(&state.database)?))
}

async fn create_batch(
    State(state): State<AppState>,
    Json(input): Json<BatchInput>,
) -> AppResult<(StatusCode, Json<Batch>)> {
    let batch = batches::create_batch(&state.database, input)?;
    Ok((StatusCode::CREATED, Json(batch)))
}

async fn get_batch(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Batch>> {
    Ok(Json(batches::get_batch(&state.database, id)?))
}

async fn replace_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<BatchInput>,
) -> AppResult<Json<Batch>> {
    Ok(Json(batches::replace_batch(&state.database, id, input)?))
}

async fn delete_batch(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<StatusCode> {
    batches::delete_batch(&state.database, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn adjacent_batches(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Adjacent>> {
    Ok(Json(batches::adjacent_batches(&state.database, id)?))
}

async fn suggest_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request: Option<Json<SuggestRequest>>,
) -> AppResult<(StatusCode, Json<Batch>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let batch =
        batches::suggest_batch(&state.database, state.generator.as_ref(), id, request).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

async fn list_children(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Batch>>> {
    Ok(Json(batches::list_children(&state.database, id)?))
}

// ============================================================================
// Ingredients
// ============================================================================

async fn suggest_ingredient_names(
    State(state): State<AppState>,
    Query(query): Query<SuggestionQuery>,
) -> AppResult<Json<Vec<UniqueIngredient>>> {
    Ok(Json(ingredients::suggest_names(&state.database, query)?))
}

async fn convert_measure(Json(request): Json<ConvertRequest>) -> AppResult<Json<Ingredient>> {
    Ok(Json(ingredients::convert(request)?))
}

// ============================================================================
// Reference URLs
// ============================================================================

async fn list_urls(State(state): State<AppState>) -> AppResult<Json<Vec<ReferenceUrl>>> {
    Ok(Json(urls::list_urls(&state.database)?))
}

async fn add_url(
    State(state): State<AppState>,
    Json(request): Json<AddUrlRequest>,
) -> AppResult<(StatusCode, Json<ReferenceUrl>)> {
    let row = urls::add_url(&state.database, request)?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn delete_url(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<StatusCode> {
    urls::delete_url(&state.database, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn index_url(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ReferenceUrl>> {
    let row = urls::index_url(
        &state.database,
        &state.http_client,
        id,
        state.config.fetch_timeout,
    )
    .await?;
    Ok(Json(row))
}

// ============================================================================
// Status
// ============================================================================

async fn status(State(state): State<AppState>) -> AppResult<Json<ServiceStatus>> {
    Ok(Json(state.status.get_status(&state.database)?))
}
