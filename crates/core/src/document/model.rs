use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::link::{LinkKind, LinkTarget};
use super::validate::ValidationError;
use crate::error::DocumentError;

/// Category of an uploaded document.
/// Maps to the `document_type` PostgreSQL enum. Deserializes through
/// [`DocumentType::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[sqlx(type_name = "document_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Report,
    ActivitySheet,
    TechnicalSheet,
    IndividualSheet,
    ExperimentalData,
    Form,
    ScientificPublication,
    Thesis,
    Image,
    Presentation,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 11] = [
        DocumentType::Report,
        DocumentType::ActivitySheet,
        DocumentType::TechnicalSheet,
        DocumentType::IndividualSheet,
        DocumentType::ExperimentalData,
        DocumentType::Form,
        DocumentType::ScientificPublication,
        DocumentType::Thesis,
        DocumentType::Image,
        DocumentType::Presentation,
        DocumentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Report => "report",
            DocumentType::ActivitySheet => "activity_sheet",
            DocumentType::TechnicalSheet => "technical_sheet",
            DocumentType::IndividualSheet => "individual_sheet",
            DocumentType::ExperimentalData => "experimental_data",
            DocumentType::Form => "form",
            DocumentType::ScientificPublication => "scientific_publication",
            DocumentType::Thesis => "thesis",
            DocumentType::Image => "image",
            DocumentType::Presentation => "presentation",
            DocumentType::Other => "other",
        }
    }

    /// Parse a type name case-insensitively, accepting either `_` or `-`
    /// as separator.
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownDocumentType(name.trim().to_string()))
    }
}

impl<'de> Deserialize<'de> for DocumentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::parse(&name).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state derived from the soft-delete marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentState {
    Active,
    Trashed,
}

/// One uploaded file's metadata and lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub original_filename: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub owner_id: Uuid,
    pub link: Option<LinkTarget>,
    pub view_count: i64,
    pub download_count: i64,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn state(&self) -> DocumentState {
        if self.deleted_at.is_some() {
            DocumentState::Trashed
        } else {
            DocumentState::Active
        }
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Database row representation of a document, one column per link slot.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub doc_type: DocumentType,
    pub storage_path: String,
    pub original_filename: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub activity_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub seminar_id: Option<Uuid>,
    pub training_id: Option<Uuid>,
    pub internship_id: Option<Uuid>,
    pub supervision_id: Option<Uuid>,
    pub knowledge_transfer_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub view_count: i64,
    pub download_count: i64,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRow {
    fn link_columns(&self) -> [Option<Uuid>; 9] {
        [
            self.project_id,
            self.activity_id,
            self.task_id,
            self.seminar_id,
            self.training_id,
            self.internship_id,
            self.supervision_id,
            self.knowledge_transfer_id,
            self.event_id,
        ]
    }
}

impl TryFrom<DocumentRow> for Document {
    type Error = DocumentError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let mut links = LinkKind::ALL
            .into_iter()
            .zip(row.link_columns())
            .filter_map(|(kind, id)| id.map(|id| LinkTarget::new(kind, id)));
        let link = links.next();
        if links.next().is_some() {
            return Err(DocumentError::Integrity(format!(
                "document {} has more than one link target",
                row.id
            )));
        }

        Ok(Document {
            id: row.id,
            title: row.title,
            description: row.description,
            doc_type: row.doc_type,
            storage_path: row.storage_path,
            original_filename: row.original_filename,
            size_bytes: row.size_bytes,
            mime_type: row.mime_type,
            tags: row.tags,
            is_public: row.is_public,
            owner_id: row.owner_id,
            link,
            view_count: row.view_count,
            download_count: row.download_count,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
