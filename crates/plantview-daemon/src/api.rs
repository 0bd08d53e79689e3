//! REST API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use glam::Vec3;
use plantview_core::EntityId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;
use crate::store::{NewEquipment, StoreError};

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

fn store_error_response(e: StoreError) -> axum::response::Response {
    match e {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, Json(ApiError::new(e.to_string()))).into_response(),
        other => {
            warn!(error = %other, "Equipment store write failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new(format!("Failed to save equipment: {}", other))),
            )
                .into_response()
        }
    }
}

/// List all equipment
pub async fn list_equipment(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let records = state.store.read().await.list();
    Json(records)
}

/// Get a single equipment record
pub async fn get_equipment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.read().await.get(EntityId(id)) {
        Some(record) => Json(record.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Equipment not found")),
        )
            .into_response(),
    }
}

/// Create equipment at a placed position
pub async fn create_equipment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewEquipment>,
) -> impl IntoResponse {
    info!(name = %req.draft.name, "Create equipment requested");
    match state.store.write().await.create(req) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Position update request body
#[derive(Deserialize)]
pub struct UpdatePositionRequest {
    pub position: Vec3,
}

/// Commit a new marker position
pub async fn update_position(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePositionRequest>,
) -> impl IntoResponse {
    match state.store.write().await.update_position(EntityId(id), req.position) {
        Ok(record) => Json(record).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Split asset listing entry
#[derive(Serialize)]
pub struct AssetInfo {
    pub name: String,
    pub parts: Vec<String>,
}

/// List assets served through reconstruction
pub async fn list_assets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let assets: Vec<AssetInfo> = state
        .proxy
        .descriptors()
        .map(|d| AssetInfo {
            name: d.name.clone(),
            parts: d.parts.clone(),
        })
        .collect();
    Json(assets)
}
