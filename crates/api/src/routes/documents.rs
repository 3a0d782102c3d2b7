//! Document lifecycle routes: upload, read, metadata, links and the trash
//! transitions of a single document.
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use cra_core::document::{Document, LinkTarget, MetadataPatch, UnlinkRequest};
use cra_core::query::{DocumentQuery, Page};
use serde_json::{json, Value};
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::state::AppState;
use crate::upload::{self, UploadLimits};

pub fn routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/v1/documents",
            post(upload_documents)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::max(upload_limit))
                .layer(RequestBodyLimitLayer::new(upload_limit))
                .get(list_documents),
        )
        .route(
            "/v1/documents/{id}",
            get(get_document)
                .patch(update_document)
                .delete(trash_document),
        )
        .route("/v1/documents/{id}/download", get(download_document))
        .route("/v1/documents/{id}/restore", post(restore_document))
        .route("/v1/documents/{id}/permanent", delete(purge_document))
        .route("/v1/documents/{id}/link", post(link_document))
        .route("/v1/documents/{id}/unlink", post(unlink_document))
}

#[tracing::instrument(skip_all)]
async fn upload_documents(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Vec<Document>>>)> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let config = state.config();
    let limits = UploadLimits {
        max_file_bytes: config.max_upload_bytes,
        max_files: config.max_files_per_upload,
    };
    let received = upload::receive(&mut multipart, state.files().as_ref(), limits).await?;

    let mut documents = Vec::with_capacity(received.files.len());
    for (index, file) in received.files.iter().enumerate() {
        let input = received.form.document_for(file);
        match state.documents().register(&requester, file.clone(), input).await {
            Ok(doc) => documents.push(doc),
            Err(err) => {
                upload::discard(state.files().as_ref(), &received.files[index..]).await;
                return Err(err.into());
            }
        }
    }

    let message = format!("{} document(s) uploaded", documents.len());
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(documents, message),
    ))
}

async fn list_documents(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppQuery(query): AppQuery<DocumentQuery>,
) -> ApiResult<Json<ApiResponse<Page<Document>>>> {
    let page = state.documents().list(&requester, &query).await?;
    Ok(ApiResponse::ok(page))
}

async fn get_document(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Document>>> {
    let doc = state.documents().get(id, &requester).await?;
    Ok(ApiResponse::ok(doc))
}

async fn download_document(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (doc, bytes) = state.documents().download(id, &requester).await?;
    let filename: String = doc
        .original_filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let headers = [
        (header::CONTENT_TYPE, doc.mime_type),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, bytes))
}

async fn update_document(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(patch): AppJson<MetadataPatch>,
) -> ApiResult<Json<ApiResponse<Document>>> {
    let doc = state.documents().update_metadata(id, patch, &requester).await?;
    Ok(ApiResponse::ok(doc))
}

async fn trash_document(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Document>>> {
    let doc = state.documents().soft_delete(id, &requester).await?;
    Ok(ApiResponse::with_message(doc, "document moved to trash"))
}

async fn restore_document(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Document>>> {
    let doc = state.documents().restore(id, &requester).await?;
    Ok(ApiResponse::with_message(doc, "document restored"))
}

async fn purge_document(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    state.documents().permanent_delete(id, &requester).await?;
    Ok(ApiResponse::with_message(
        json!({ "id": id }),
        "document permanently deleted",
    ))
}

async fn link_document(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(target): AppJson<LinkTarget>,
) -> ApiResult<Json<ApiResponse<Document>>> {
    let doc = state.documents().link(id, target, &requester).await?;
    Ok(ApiResponse::ok(doc))
}

/// `entityType` and `entityId` are optional query parameters.
async fn unlink_document(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppQuery(request): AppQuery<UnlinkRequest>,
) -> ApiResult<Json<ApiResponse<Document>>> {
    let doc = state.documents().unlink(id, request, &requester).await?;
    Ok(ApiResponse::ok(doc))
}
