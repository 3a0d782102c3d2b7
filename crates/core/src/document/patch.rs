//! Request payloads accepted by the managers.
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::link::{LinkKind, LinkTarget};
use super::model::DocumentType;

/// What the upload collaborator reports after storing a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub original_filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub stored_path: String,
}

/// Caller-supplied metadata for a new document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub doc_type: Option<DocumentType>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    /// Every link the caller supplied. At most one distinct target is accepted.
    #[serde(default)]
    pub links: Vec<LinkTarget>,
}

/// Partial metadata update. Absent fields are left untouched; an empty
/// description clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub doc_type: Option<DocumentType>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.doc_type.is_none()
            && self.tags.is_none()
            && self.is_public.is_none()
    }
}

/// Unlink request. With no kind and no id, whatever link is set is cleared.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlinkRequest {
    #[serde(default, rename = "entityType")]
    pub kind: Option<LinkKind>,
    #[serde(default, rename = "entityId")]
    pub id: Option<Uuid>,
}

/// Permissions granted by a share.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareOptions {
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial permission update on an existing share.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionPatch {
    #[serde(default)]
    pub can_edit: Option<bool>,
    #[serde(default)]
    pub can_delete: Option<bool>,
}
