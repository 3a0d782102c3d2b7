use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use cra_core::document::{DocumentShare, PermissionPatch, ShareOptions};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiResponse, ApiResult};
use crate::extract::{AppJson, AppPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/documents/{id}/shares",
            get(list_shares).post(share_document),
        )
        .route(
            "/v1/documents/{id}/shares/{share_id}",
            patch(update_share).delete(revoke_share),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareRequest {
    user_ids: Vec<Uuid>,
    #[serde(flatten)]
    options: ShareOptions,
}

async fn share_document(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<ShareRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Vec<DocumentShare>>>)> {
    let shares = state
        .shares()
        .share(id, &request.user_ids, request.options, &requester)
        .await?;
    let message = format!("document shared with {} user(s)", shares.len());
    Ok((StatusCode::CREATED, ApiResponse::with_message(shares, message)))
}

async fn list_shares(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Vec<DocumentShare>>>> {
    let shares = state.shares().list_shares(id, &requester).await?;
    Ok(ApiResponse::ok(shares))
}

async fn update_share(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath((id, share_id)): AppPath<(Uuid, Uuid)>,
    AppJson(patch): AppJson<PermissionPatch>,
) -> ApiResult<Json<ApiResponse<DocumentShare>>> {
    let share = state
        .shares()
        .update_permissions(id, share_id, patch, &requester)
        .await?;
    Ok(ApiResponse::ok(share))
}

async fn revoke_share(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath((id, share_id)): AppPath<(Uuid, Uuid)>,
) -> ApiResult<Json<ApiResponse<DocumentShare>>> {
    let share = state.shares().revoke(id, share_id, &requester).await?;
    Ok(ApiResponse::with_message(share, "share revoked"))
}
