/// Document validation utilities.
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::link::LinkTarget;
use super::model::DocumentType;

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_TAG_LEN: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("document title is required")]
    EmptyTitle,
    #[error("document title cannot exceed {max} characters")]
    TitleTooLong { max: usize },
    #[error("document description cannot exceed {max} characters")]
    DescriptionTooLong { max: usize },
    #[error("a document cannot carry more than {max} tags")]
    TooManyTags { max: usize },
    #[error("tags must be non-empty and at most {max} characters")]
    InvalidTag { max: usize },
    #[error("unsupported file type: {0}")]
    UnsupportedMimeType(String),
    #[error("a document can be linked to at most one entity")]
    MultipleLinkTargets,
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),
    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),
    #[error("share expiration must be in the future")]
    ExpiryInPast,
    #[error("at least one user to share with is required")]
    NoShareTargets,
    #[error("a document cannot be shared with its owner")]
    ShareWithOwner,
}

/// Trim and bound a title.
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong { max: MAX_TITLE_LEN });
    }
    Ok(title.to_string())
}

/// Trim a description; blank descriptions become `None`.
pub fn validate_description(description: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::DescriptionTooLong {
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(Some(description.to_string()))
}

/// Trim tags, drop duplicates while keeping first-seen order, and cap the count.
pub fn normalize_tags(tags: &[String], max_tags: usize) -> Result<Vec<String>, ValidationError> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
            return Err(ValidationError::InvalidTag { max: MAX_TAG_LEN });
        }
        if !normalized.iter().any(|existing| existing == tag) {
            normalized.push(tag.to_string());
        }
    }
    if normalized.len() > max_tags {
        return Err(ValidationError::TooManyTags { max: max_tags });
    }
    Ok(normalized)
}

/// Strip parameters and case from a MIME type (`Text/Plain; charset=utf-8` -> `text/plain`).
pub fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Map an accepted MIME type to the document type used when the caller gives none.
pub fn document_type_for_mime(mime_type: &str) -> Result<DocumentType, ValidationError> {
    let ty = match essence(mime_type).as_str() {
        "image/jpeg" | "image/png" | "image/gif" | "image/webp" | "image/svg+xml" => {
            DocumentType::Image
        }
        "application/vnd.ms-powerpoint"
        | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        | "application/vnd.oasis.opendocument.presentation" => DocumentType::Presentation,
        "text/csv"
        | "application/json"
        | "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.oasis.opendocument.spreadsheet" => DocumentType::ExperimentalData,
        "application/pdf"
        | "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/vnd.oasis.opendocument.text"
        | "application/rtf"
        | "text/plain"
        | "text/markdown"
        | "application/zip" => DocumentType::Other,
        _ => return Err(ValidationError::UnsupportedMimeType(mime_type.to_string())),
    };
    Ok(ty)
}

pub fn is_supported_mime(mime_type: &str) -> bool {
    document_type_for_mime(mime_type).is_ok()
}

/// Collapse the supplied link targets to zero or one.
pub fn single_link(links: &[LinkTarget]) -> Result<Option<LinkTarget>, ValidationError> {
    match links.split_first() {
        None => Ok(None),
        Some((first, rest)) if rest.iter().all(|other| other == first) => Ok(Some(*first)),
        Some(_) => Err(ValidationError::MultipleLinkTargets),
    }
}

pub fn validate_expiry(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    match expires_at {
        Some(expires) if expires <= now => Err(ValidationError::ExpiryInPast),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LinkKind;
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn title_is_trimmed_and_bounded() {
        assert_eq!(validate_title("  Rapport  ").unwrap(), "Rapport");
        assert_eq!(validate_title("   "), Err(ValidationError::EmptyTitle));
        assert_eq!(
            validate_title(&"x".repeat(MAX_TITLE_LEN + 1)),
            Err(ValidationError::TitleTooLong { max: MAX_TITLE_LEN })
        );
    }

    #[test]
    fn blank_description_is_none() {
        assert_eq!(validate_description(Some("  ")).unwrap(), None);
        assert_eq!(
            validate_description(Some(" notes ")).unwrap(),
            Some("notes".to_string())
        );
    }

    #[test]
    fn tags_are_deduplicated_then_capped() {
        let tags: Vec<String> = vec!["ml".into(), " ml ".into(), "bio".into()];
        assert_eq!(normalize_tags(&tags, 2).unwrap(), vec!["ml", "bio"]);

        let many: Vec<String> = (0..4).map(|i| format!("t{i}")).collect();
        assert_eq!(
            normalize_tags(&many, 3),
            Err(ValidationError::TooManyTags { max: 3 })
        );
        assert!(normalize_tags(&["".to_string()], 3).is_err());
    }

    #[test]
    fn mime_types_map_to_document_types() {
        assert_eq!(document_type_for_mime("image/PNG").unwrap(), DocumentType::Image);
        assert_eq!(
            document_type_for_mime("text/csv; charset=utf-8").unwrap(),
            DocumentType::ExperimentalData
        );
        assert_eq!(
            document_type_for_mime("application/pdf").unwrap(),
            DocumentType::Other
        );
        assert!(matches!(
            document_type_for_mime("application/x-msdownload"),
            Err(ValidationError::UnsupportedMimeType(_))
        ));
    }

    #[test]
    fn at_most_one_distinct_link() {
        let a = LinkTarget::new(LinkKind::Activity, Uuid::new_v4());
        let b = LinkTarget::new(LinkKind::Project, Uuid::new_v4());
        assert_eq!(single_link(&[]).unwrap(), None);
        assert_eq!(single_link(&[a, a]).unwrap(), Some(a));
        assert_eq!(single_link(&[a, b]), Err(ValidationError::MultipleLinkTargets));
    }

    #[test]
    fn expiry_must_be_in_the_future() {
        let now = Utc::now();
        assert!(validate_expiry(None, now).is_ok());
        assert!(validate_expiry(Some(now + Duration::days(1)), now).is_ok());
        assert_eq!(
            validate_expiry(Some(now - Duration::days(1)), now),
            Err(ValidationError::ExpiryInPast)
        );
    }
}
