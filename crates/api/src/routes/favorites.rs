use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use cra_core::document::Document;
use cra_core::query::{DocumentQuery, Page};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiResponse, ApiResult};
use crate::extract::{AppPath, AppQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/documents/favorites", get(list_favorites))
        .route(
            "/v1/documents/{id}/favorite",
            post(add_favorite).delete(remove_favorite),
        )
}

async fn list_favorites(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppQuery(query): AppQuery<DocumentQuery>,
) -> ApiResult<Json<ApiResponse<Page<Document>>>> {
    let page = state.favorites().list_favorites(&requester, &query).await?;
    Ok(ApiResponse::ok(page))
}

/// Idempotent: favoriting twice leaves a single favorite.
async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    state.favorites().add_favorite(id, &requester).await?;
    Ok(ApiResponse::ok(json!({ "documentId": id, "favorite": true })))
}

async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    state.favorites().remove_favorite(id, &requester).await?;
    Ok(ApiResponse::ok(json!({ "documentId": id, "favorite": false })))
}
