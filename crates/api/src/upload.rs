//! Multipart upload intake: stores each file part and collects the metadata
//! fields that travel alongside it.
use std::path::Path;

use axum::extract::multipart::{Field, Multipart, MultipartError};
use cra_core::document::validate::is_supported_mime;
use cra_core::document::{DocumentType, FileMeta, LinkKind, LinkTarget, NewDocument};
use cra_core::storage::{storage_key, FileStorage};
use cra_core::DocumentError;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_file_bytes: usize,
    pub max_files: usize,
}

/// Metadata fields of an upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub doc_type: Option<DocumentType>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub links: Vec<LinkTarget>,
}

impl UploadForm {
    /// Registration input for one uploaded file. Without a title the
    /// file name, minus its extension, is used.
    pub fn document_for(&self, file: &FileMeta) -> NewDocument {
        let title = self.title.clone().unwrap_or_else(|| {
            Path::new(&file.original_filename)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(&file.original_filename)
                .to_string()
        });
        NewDocument {
            title,
            description: self.description.clone(),
            doc_type: self.doc_type,
            tags: self.tags.clone(),
            is_public: self.is_public,
            links: self.links.clone(),
        }
    }

    fn apply(&mut self, name: &str, value: String) -> Result<(), ApiError> {
        match name {
            "title" => self.title = Some(value),
            "description" => self.description = Some(value),
            "type" => {
                let parsed = DocumentType::parse(&value).map_err(DocumentError::from)?;
                self.doc_type = Some(parsed);
            }
            "tags" | "tags[]" => self.tags.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string),
            ),
            "isPublic" => self.is_public = parse_flag(&value)?,
            other => {
                // Unknown fields are ignored; link fields are named after the entity.
                if let Some(kind) = LinkKind::from_field_name(other) {
                    let value = value.trim();
                    if !value.is_empty() {
                        let id = Uuid::parse_str(value)
                            .map_err(|_| ApiError::BadRequest(format!("{other} is not a valid id")))?;
                        self.links.push(LinkTarget::new(kind, id));
                    }
                }
            }
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        _ => Err(ApiError::BadRequest(format!("isPublic must be a boolean, got {value:?}"))),
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// A parsed upload: the stored files and the shared form fields.
#[derive(Debug)]
pub struct Upload {
    pub files: Vec<FileMeta>,
    pub form: UploadForm,
}

/// Read every part of `multipart`, writing file parts to `storage`.
///
/// On any error the files already written by this call are deleted again.
pub async fn receive(
    multipart: &mut Multipart,
    storage: &dyn FileStorage,
    limits: UploadLimits,
) -> Result<Upload, ApiError> {
    let mut upload = Upload {
        files: Vec::new(),
        form: UploadForm::default(),
    };
    match read_parts(multipart, storage, limits, &mut upload).await {
        Ok(()) if upload.files.is_empty() => {
            Err(ApiError::BadRequest("no file was uploaded".to_string()))
        }
        Ok(()) => Ok(upload),
        Err(err) => {
            discard(storage, &upload.files).await;
            Err(err)
        }
    }
}

async fn read_parts(
    multipart: &mut Multipart,
    storage: &dyn FileStorage,
    limits: UploadLimits,
    upload: &mut Upload,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_some() {
            if upload.files.len() == limits.max_files {
                return Err(ApiError::BadRequest(format!(
                    "at most {} files can be uploaded at once",
                    limits.max_files
                )));
            }
            let file = store_file(field, storage, limits.max_file_bytes).await?;
            upload.files.push(file);
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            upload.form.apply(&name, value)?;
        }
    }
    Ok(())
}

async fn store_file(
    mut field: Field<'_>,
    storage: &dyn FileStorage,
    max_bytes: usize,
) -> Result<FileMeta, ApiError> {
    let original_filename = field.file_name().unwrap_or("upload").to_string();
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    if !is_supported_mime(&mime_type) {
        return Err(ApiError::Validation(format!(
            "file type {mime_type} is not supported"
        )));
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "{original_filename} exceeds the {max_bytes} byte limit"
            )));
        }
        bytes.extend_from_slice(&chunk);
    }

    let stored_path = storage_key(&original_filename);
    storage
        .write(&stored_path, &bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to store upload: {e}")))?;
    tracing::debug!(path = %stored_path, size = bytes.len(), "upload stored");

    Ok(FileMeta {
        original_filename,
        mime_type,
        size_bytes: bytes.len() as i64,
        stored_path,
    })
}

/// Best-effort removal of stored bytes that never became documents.
pub async fn discard(storage: &dyn FileStorage, files: &[FileMeta]) {
    for file in files {
        if let Err(e) = storage.delete(&file.stored_path).await {
            tracing::warn!(path = %file.stored_path, error = %e, "failed to discard upload");
        }
    }
}
