//! JSON HTTP API over the recipe service.
//!
//! # Endpoints
//!
//! | Method   | Path               | Description |
//! |----------|--------------------|-------------|
//! | `POST`   | `/recipes`         | Add a recipe from a URL |
//! | `GET`    | `/recipes/{slug}`  | Full recipe from the canonical file |
//! | `DELETE` | `/recipes/{slug}`  | Delete a recipe |
//! | `GET`    | `/search`          | Paginated search (`q`, `tag`, `page`, `page_size`) |
//! | `GET`    | `/tags`            | All tags with recipe counts |
//! | `POST`   | `/rebuild`         | Rebuild the index from the files |
//! | `GET`    | `/health`          | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "duplicate", "message": "recipe already exists: chicken-curry", "slug": "chicken-curry" } }
//! ```
//!
//! Error codes: `not_found` (404), `duplicate` (409, with the existing
//! slug), `parse` / `unsupported_site` (422), `timeout` (408), `network`
//! (502), `index_unavailable` (503), `storage` / `internal` (500).

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::error::{ExtractError, RecipeError};
use crate::models::{RebuildReport, Recipe, SearchPage, TagCount};
use crate::service::RecipeService;

#[derive(Clone)]
struct AppState {
    service: Arc<RecipeService>,
}

/// Start the JSON API server on the configured bind address. Runs until
/// the process is terminated.
pub async fn run_server(config: &Config, service: Arc<RecipeService>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/recipes", post(handle_add))
        .route("/recipes/{slug}", get(handle_get).delete(handle_delete))
        .route("/search", get(handle_search))
        .route("/tags", get(handle_tags))
        .route("/rebuild", post(handle_rebuild))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { service });

    info!(bind = %bind_addr, "API server listening");
    println!("recipebox API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"not_found"`, `"duplicate"`).
    code: &'static str,
    message: String,
    /// Existing slug, present on `duplicate` so callers can redirect.
    #[serde(skip_serializing_if = "Option::is_none")]
    slug: Option<String>,
}

struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    slug: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                slug: self.slug,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Map a typed service error onto the HTTP error contract.
fn classify_error(err: RecipeError) -> ApiError {
    let message = err.to_string();
    let (status, code, slug) = match err {
        RecipeError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", None),
        RecipeError::Duplicate { slug } => (StatusCode::CONFLICT, "duplicate", Some(slug)),
        RecipeError::Parse { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "parse", None),
        RecipeError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage", None),
        RecipeError::Index(_) => (StatusCode::SERVICE_UNAVAILABLE, "index_unavailable", None),
        RecipeError::Extract(extract) => match extract {
            ExtractError::UnsupportedSite { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unsupported_site", None)
            }
            ExtractError::Network(_) => (StatusCode::BAD_GATEWAY, "network", None),
            ExtractError::Timeout { .. } => (StatusCode::REQUEST_TIMEOUT, "timeout", None),
            ExtractError::Parse(_) => (StatusCode::UNPROCESSABLE_ENTITY, "parse", None),
        },
    };
    let message = match code {
        "index_unavailable" => format!("service temporarily limited: {message}"),
        _ => message,
    };
    ApiError {
        status,
        code,
        message,
        slug,
    }
}

// ============ POST /recipes ============

#[derive(Deserialize)]
struct AddRequest {
    url: String,
}

#[derive(Serialize)]
struct AddResponse {
    slug: String,
    title: String,
}

async fn handle_add(
    State(state): State<AppState>,
    Json(req): Json<AddRequest>,
) -> Result<(StatusCode, Json<AddResponse>), ApiError> {
    let recipe = state
        .service
        .add(req.url.trim())
        .await
        .map_err(classify_error)?;
    Ok((
        StatusCode::CREATED,
        Json(AddResponse {
            slug: recipe.slug,
            title: recipe.title,
        }),
    ))
}

// ============ GET /recipes/{slug} ============

async fn handle_get(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    let recipe = state.service.get(&slug).map_err(classify_error)?;
    Ok(Json(recipe))
}

// ============ DELETE /recipes/{slug} ============

async fn handle_delete(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(&slug).await.map_err(classify_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    tag: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>, ApiError> {
    let page = state
        .service
        .search(
            params.q.as_deref(),
            params.tag.as_deref(),
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20),
        )
        .await
        .map_err(classify_error)?;
    Ok(Json(page))
}

// ============ GET /tags ============

#[derive(Serialize)]
struct TagsResponse {
    tags: Vec<TagCount>,
}

async fn handle_tags(State(state): State<AppState>) -> Result<Json<TagsResponse>, ApiError> {
    let tags = state.service.list_tags().await.map_err(classify_error)?;
    Ok(Json(TagsResponse { tags }))
}

// ============ POST /rebuild ============

async fn handle_rebuild(
    State(state): State<AppState>,
) -> Result<Json<RebuildReport>, ApiError> {
    let report = state.service.rebuild().await.map_err(classify_error)?;
    Ok(Json(report))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
