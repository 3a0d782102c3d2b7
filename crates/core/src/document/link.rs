/// Link target parsing utilities.
///
/// A document can be attached to at most one owning entity. The entity kind
/// names follow the CRA API conventions:
/// - Canonical: `knowledge_transfer`
/// - Kebab form: `knowledge-transfer`
/// - Form field: `knowledgeTransferId`
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::validate::ValidationError;

/// Serializes in the canonical form and deserializes through [`LinkKind::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Project,
    Activity,
    Task,
    Seminar,
    Training,
    Internship,
    Supervision,
    KnowledgeTransfer,
    Event,
}

impl LinkKind {
    /// Every kind, in the column order used by the `documents` table.
    pub const ALL: [LinkKind; 9] = [
        LinkKind::Project,
        LinkKind::Activity,
        LinkKind::Task,
        LinkKind::Seminar,
        LinkKind::Training,
        LinkKind::Internship,
        LinkKind::Supervision,
        LinkKind::KnowledgeTransfer,
        LinkKind::Event,
    ];

    /// Parse a kind name case-insensitively, accepting either `_` or `-`
    /// as separator.
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownEntityType(name.trim().to_string()))
    }

    /// Parse a multipart/query field name such as `activityId`.
    pub fn from_field_name(field: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.field_name() == field)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Project => "project",
            LinkKind::Activity => "activity",
            LinkKind::Task => "task",
            LinkKind::Seminar => "seminar",
            LinkKind::Training => "training",
            LinkKind::Internship => "internship",
            LinkKind::Supervision => "supervision",
            LinkKind::KnowledgeTransfer => "knowledge_transfer",
            LinkKind::Event => "event",
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            LinkKind::Project => "projectId",
            LinkKind::Activity => "activityId",
            LinkKind::Task => "taskId",
            LinkKind::Seminar => "seminarId",
            LinkKind::Training => "trainingId",
            LinkKind::Internship => "internshipId",
            LinkKind::Supervision => "supervisionId",
            LinkKind::KnowledgeTransfer => "knowledgeTransferId",
            LinkKind::Event => "eventId",
        }
    }

    /// Column on `documents` holding this link.
    pub fn column(&self) -> &'static str {
        match self {
            LinkKind::Project => "project_id",
            LinkKind::Activity => "activity_id",
            LinkKind::Task => "task_id",
            LinkKind::Seminar => "seminar_id",
            LinkKind::Training => "training_id",
            LinkKind::Internship => "internship_id",
            LinkKind::Supervision => "supervision_id",
            LinkKind::KnowledgeTransfer => "knowledge_transfer_id",
            LinkKind::Event => "event_id",
        }
    }

    /// Table holding the owning entities of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            LinkKind::Project => "projects",
            LinkKind::Activity => "activities",
            LinkKind::Task => "tasks",
            LinkKind::Seminar => "seminars",
            LinkKind::Training => "trainings",
            LinkKind::Internship => "internships",
            LinkKind::Supervision => "supervisions",
            LinkKind::KnowledgeTransfer => "knowledge_transfers",
            LinkKind::Event => "events",
        }
    }
}

impl<'de> Deserialize<'de> for LinkKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::parse(&name).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single owning entity a document is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTarget {
    #[serde(rename = "entityType")]
    pub kind: LinkKind,
    #[serde(rename = "entityId")]
    pub id: Uuid,
}

impl LinkTarget {
    pub fn new(kind: LinkKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    /// Spread an optional link over the nine link columns, in [`LinkKind::ALL`] order.
    pub fn to_columns(link: Option<&LinkTarget>) -> [Option<Uuid>; 9] {
        LinkKind::ALL.map(|kind| match link {
            Some(target) if target.kind == kind => Some(target.id),
            _ => None,
        })
    }
}
