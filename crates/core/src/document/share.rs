use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One grant of access from a document owner to another user.
///
/// Shares are never deleted while the document exists. Revocation and expiry
/// both leave the row in place; only [`DocumentShare::is_active`] changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DocumentShare {
    pub id: Uuid,
    pub document_id: Uuid,
    pub shared_with_id: Uuid,
    pub can_edit: bool,
    pub can_delete: bool,
    pub shared_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<Uuid>,
}

impl DocumentShare {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}

/// A user's bookmark of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFavorite {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn share(expires_at: Option<DateTime<Utc>>, revoked_at: Option<DateTime<Utc>>) -> DocumentShare {
        DocumentShare {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            shared_with_id: Uuid::new_v4(),
            can_edit: true,
            can_delete: false,
            shared_at: Utc::now(),
            expires_at,
            revoked_at,
            revoked_by: None,
        }
    }

    #[test]
    fn open_ended_share_is_active() {
        assert!(share(None, None).is_active(Utc::now()));
    }

    #[test]
    fn expiry_is_evaluated_against_now() {
        let now = Utc::now();
        let s = share(Some(now + Duration::hours(1)), None);
        assert!(s.is_active(now));
        assert!(!s.is_active(now + Duration::hours(1)));
        assert!(!s.is_revoked());
    }

    #[test]
    fn revoked_share_is_inactive() {
        let now = Utc::now();
        assert!(!share(None, Some(now)).is_active(now));
    }
}
