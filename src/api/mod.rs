//! HTTP API
//!
//! Thin axum layer over the database and workflow modules. All state
//! lives behind one async mutex; SQLite does the heavy lifting and the
//! handlers hold the lock only for the duration of one request.

pub mod assignments;
pub mod auth;
pub mod error;
pub mod profiles;
pub mod qa;
pub mod questions;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::db::Database;
use auth::AuthConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(db: Database, server: &ServerConfig) -> Self {
        AppState {
            db: Arc::new(Mutex::new(db)),
            auth: Arc::new(AuthConfig::from_tokens(&server.tokens)),
        }
    }
}

async fn health() -> impl IntoResponse {
    "OK"
}

/// Build the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Question bank
        .route(
            "/api/question-bank",
            get(questions::list).post(questions::create),
        )
        .route(
            "/api/question-bank/:id",
            get(questions::show)
                .put(questions::update)
                .delete(questions::delete),
        )
        .route("/api/question-bank/filters", get(questions::facets))
        // Assignments
        .route(
            "/api/question-assignments",
            get(assignments::list).post(assignments::create),
        )
        .route("/api/question-assignments/bulk", post(assignments::bulk))
        .route(
            "/api/question-assignments/:id",
            put(assignments::update).delete(assignments::delete),
        )
        // QA review
        .route("/api/qa", get(qa::list).post(qa::upsert))
        .route("/api/qa/history", get(qa::history))
        // Profiles
        .route("/api/profiles", get(profiles::list).post(profiles::create))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        // Health check (unauthenticated)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!("API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}
