use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::Profile;

use super::error::ApiError;
use super::AppState;

/// GET /api/profiles — optionally filtered by role (the assignment UI
/// asks for content managers and reviewers).
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Profile>>, ApiError> {
    let db = state.db.lock().await;
    let profiles = db.list_profiles(params.get("role").map(String::as_str))?;
    Ok(Json(profiles))
}

#[derive(Deserialize)]
pub struct NewProfile {
    pub id: Option<String>,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
}

/// POST /api/profiles
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewProfile>,
) -> Result<impl IntoResponse, ApiError> {
    if body.full_name.trim().is_empty() {
        return Err(ApiError::BadRequest("full_name is required".into()));
    }
    let profile = Profile {
        id: body.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        full_name: body.full_name,
        email: body.email,
        role: body.role,
    };
    let db = state.db.lock().await;
    db.upsert_profile(&profile)?;
    Ok((StatusCode::CREATED, Json(profile)))
}
