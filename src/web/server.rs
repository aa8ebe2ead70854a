//! Axum web server for dynamic queries.
//!
//! Routes:
//!
//! ```text
//! GET  /api/dynamic-queries                 list records, newest first
//! POST /api/dynamic-queries                 create {name, prompt} -> id
//! GET  /api/dynamic-queries/sql             compiled SQL of the system query
//! GET  /api/dynamic-queries/{id}            fetch one record
//! PUT  /api/dynamic-queries/{id}            rename {name}
//! GET  /api/dynamic-queries/{id}/generate   streaming generation (SSE)
//! POST /api/dynamic-queries/{id}/generate   blocking generation
//! GET  /api/dynamic-queries/{id}/results    run the stored SQL
//! POST /api/query-specs/compile             compile a posted QuerySpec
//! ```
//!
//! Authentication and role checks are expected in front of this router.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use super::error::ApiError;
use crate::completion::ResponsesClient;
use crate::config::Settings;
use crate::engine::{ExecutionService, TrinoClient};
use crate::generation::Orchestrator;
use crate::spec::{system, QuerySpec};
use crate::sql::Compiler;
use crate::store::{DynamicQuery, DynamicQueryStore, SqliteStore};

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn DynamicQueryStore>,
    pub orchestrator: Orchestrator,
    pub execution: ExecutionService,
    pub compiler: Compiler,
}

/// Build the axum router with all routes
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/dynamic-queries", get(list_queries).post(create_query))
        .route("/api/dynamic-queries/sql", get(system_sql))
        .route("/api/dynamic-queries/{id}", get(get_query).put(rename_query))
        .route(
            "/api/dynamic-queries/{id}/generate",
            get(stream_generation).post(generate),
        )
        .route("/api/dynamic-queries/{id}/results", get(results))
        .route("/api/query-specs/compile", post(compile_spec))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Wire up the store, clients and services described by `settings`.
pub fn build_state(settings: &Settings) -> Result<AppState, Box<dyn std::error::Error>> {
    let path = match settings.store.resolved_path()? {
        Some(path) => path,
        None => SqliteStore::default_path()?,
    };
    let store: Arc<dyn DynamicQueryStore> = Arc::new(SqliteStore::open(&path)?);

    let completion = ResponsesClient::new(
        &settings.completion.resolved_base_url()?,
        &settings.completion.resolved_api_key()?,
        settings.completion.timeout(),
    )?;
    let engine = TrinoClient::new(
        &settings.engine.resolved_base_url()?,
        &settings.engine.user,
        settings.engine.timeout(),
    )?;

    Ok(AppState {
        orchestrator: Orchestrator::new(
            Arc::clone(&store),
            Arc::new(completion),
            settings.generation()?,
        ),
        store,
        execution: ExecutionService::new(Arc::new(engine)),
        compiler: settings.compiler.compiler(),
    })
}

/// Start the web server
pub async fn serve(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(build_state(&settings)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind).await?;
    info!(bind = %settings.server.bind, "dynq listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

// ============================================================================
// Envelope
// ============================================================================

/// Successful response body: `{"message", "details", "data"}`.
#[derive(Serialize)]
pub struct Success<T> {
    pub message: &'static str,
    pub details: &'static str,
    pub data: T,
}

impl<T> Success<T> {
    fn new(data: T) -> Json<Self> {
        Json(Self {
            message: "Success",
            details: "The request was successful.",
            data,
        })
    }
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid id '{}'", raw)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

// ============================================================================
// Dynamic query handlers
// ============================================================================

#[derive(Deserialize)]
struct CreateRequest {
    name: String,
    prompt: String,
}

#[derive(Deserialize)]
struct RenameRequest {
    name: String,
}

/// GET /api/dynamic-queries
async fn list_queries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Success<Vec<DynamicQuery>>>, ApiError> {
    Ok(Success::new(state.store.list().await?))
}

/// POST /api/dynamic-queries
async fn create_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Success<Uuid>>), ApiError> {
    let req = body(payload)?;
    if req.name.trim().is_empty() || req.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("name and prompt are required".into()));
    }

    let record = state.store.create(&req.name, &req.prompt).await?;
    info!(query_id = %record.id, "dynamic query created");
    Ok((StatusCode::CREATED, Success::new(record.id)))
}

/// GET /api/dynamic-queries/{id}
async fn get_query(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Success<DynamicQuery>>, ApiError> {
    let id = parse_id(&id)?;
    let record = state.store.get(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Success::new(record))
}

/// PUT /api/dynamic-queries/{id}
async fn rename_query(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<Success<DynamicQuery>>, ApiError> {
    let id = parse_id(&id)?;
    let req = body(payload)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }
    Ok(Success::new(state.store.rename(id, &req.name).await?))
}

/// GET /api/dynamic-queries/{id}/generate
async fn stream_generation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let id = parse_id(&id)?;
    let frames = state.orchestrator.stream(id).await?;
    let events = frames.map(|frame| Ok::<_, Infallible>(Event::from(frame)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// POST /api/dynamic-queries/{id}/generate
async fn generate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Success<DynamicQuery>>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Success::new(state.orchestrator.generate(id).await?))
}

/// GET /api/dynamic-queries/{id}/results
async fn results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Success<serde_json::Value>>, ApiError> {
    let id = parse_id(&id)?;
    let record = state.store.get(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Success::new(state.execution.run(&record).await?))
}

// ============================================================================
// Compiler handlers
// ============================================================================

/// GET /api/dynamic-queries/sql
async fn system_sql(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    Ok(state.compiler.compile(&system::customers_with_addresses())?)
}

/// POST /api/query-specs/compile
async fn compile_spec(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QuerySpec>, JsonRejection>,
) -> Result<String, ApiError> {
    let spec = body(payload)?;
    Ok(state.compiler.compile(&spec)?)
}
