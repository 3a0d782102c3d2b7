use axum::{extract::State, routing::get, Json, Router};
use cra_core::document::Document;
use cra_core::query::{DocumentQuery, Page};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::{ApiResponse, ApiResult};
use crate::extract::AppQuery;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/v1/documents/trash",
        get(list_trash).delete(empty_trash),
    )
}

async fn list_trash(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppQuery(query): AppQuery<DocumentQuery>,
) -> ApiResult<Json<ApiResponse<Page<Document>>>> {
    let page = state.documents().list_trash(&requester, &query).await?;
    Ok(ApiResponse::ok(page))
}

/// Purges trash past the retention window.
async fn empty_trash(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let purged = state.documents().empty_trash(&requester).await?;
    Ok(ApiResponse::with_message(
        json!({ "purged": purged }),
        format!("{purged} document(s) purged"),
    ))
}
