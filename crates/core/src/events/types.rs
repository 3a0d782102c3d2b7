use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted after successful document operations, consumed by the
/// notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocumentEvent {
    Uploaded(DocumentActivity),
    Shared(ShareNotice),
    Trashed(DocumentActivity),
    Restored(DocumentActivity),
    Purged(DocumentActivity),
}

impl DocumentEvent {
    pub fn document_id(&self) -> Uuid {
        match self {
            DocumentEvent::Uploaded(a)
            | DocumentEvent::Trashed(a)
            | DocumentEvent::Restored(a)
            | DocumentEvent::Purged(a) => a.document_id,
            DocumentEvent::Shared(notice) => notice.document_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentActivity {
    pub document_id: Uuid,
    /// `None` when the scheduled trash sweep acted.
    pub actor_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

/// "Document shared with users [...]".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareNotice {
    pub document_id: Uuid,
    pub document_title: String,
    pub shared_by: Uuid,
    pub user_ids: Vec<Uuid>,
    pub can_edit: bool,
    pub can_delete: bool,
    pub timestamp: DateTime<Utc>,
}
