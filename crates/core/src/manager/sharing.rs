use uuid::Uuid;

use super::{require, ManagerContext};
use crate::document::validate::validate_expiry;
use crate::document::{DocumentShare, PermissionPatch, ShareOptions};
use crate::error::{DocumentError, DocumentResult};
use crate::events::{DocumentEvent, ShareNotice};
use crate::identity::Requester;
use crate::store::ShareGrant;
use crate::ValidationError;

/// Grants, updates and revokes per-user access to documents.
///
/// Expiry is never written back to storage: an expired share simply stops
/// being active once the clock passes `expires_at`.
#[derive(Clone)]
pub struct ShareManager {
    ctx: ManagerContext,
}

impl ShareManager {
    pub fn new(ctx: ManagerContext) -> Self {
        Self { ctx }
    }

    /// Share a document with each of `user_ids`.
    ///
    /// An active share for a user is updated in place. A revoked or expired
    /// one is left in the history and a new record is created. The whole
    /// batch is written in one transaction.
    #[tracing::instrument(skip(self, user_ids), fields(targets = user_ids.len()))]
    pub async fn share(
        &self,
        document_id: Uuid,
        user_ids: &[Uuid],
        options: ShareOptions,
        requester: &Requester,
    ) -> DocumentResult<Vec<DocumentShare>> {
        let (doc, shares) = self.ctx.load_active(document_id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).share,
            "only the owner or an administrator can share this document",
        )?;

        let now = self.ctx.clock.now();
        validate_expiry(options.expires_at, now)?;

        let mut targets: Vec<Uuid> = Vec::with_capacity(user_ids.len());
        for id in user_ids {
            if !targets.contains(id) {
                targets.push(*id);
            }
        }
        if targets.is_empty() {
            return Err(ValidationError::NoShareTargets.into());
        }
        if targets.contains(&doc.owner_id) {
            return Err(ValidationError::ShareWithOwner.into());
        }
        for target in &targets {
            if !self.ctx.store.user_exists(*target).await? {
                return Err(DocumentError::NotFound(format!("user {target}")));
            }
        }

        let grants: Vec<ShareGrant> = targets
            .iter()
            .map(|target| {
                let retire = shares
                    .iter()
                    .filter(|share| share.shared_with_id == *target && !share.is_revoked())
                    .filter(|share| !share.is_active(now))
                    .max_by_key(|share| share.shared_at)
                    .map(|expired| DocumentShare {
                        revoked_at: Some(now),
                        revoked_by: Some(requester.user_id),
                        ..expired.clone()
                    });
                ShareGrant {
                    share: new_share(document_id, *target, options, now),
                    retire,
                }
            })
            .collect();
        let granted = self.ctx.store.grant_shares(&grants).await?;

        tracing::info!(%document_id, shared_with = ?targets, "document shared");
        self.ctx.events.notify(DocumentEvent::Shared(ShareNotice {
            document_id,
            document_title: doc.title,
            shared_by: requester.user_id,
            user_ids: targets,
            can_edit: options.can_edit,
            can_delete: options.can_delete,
            timestamp: now,
        }));
        Ok(granted)
    }

    /// Sharers see the full history, revoked records included. Anyone else
    /// who can view the document only sees their own records.
    pub async fn list_shares(
        &self,
        document_id: Uuid,
        requester: &Requester,
    ) -> DocumentResult<Vec<DocumentShare>> {
        let (doc, shares) = self.ctx.load_active(document_id).await?;
        let access = self.ctx.access(requester, &doc, &shares);
        if access.share {
            return Ok(shares);
        }
        require(access.view, "you do not have access to this document")?;
        Ok(shares
            .into_iter()
            .filter(|share| share.shared_with_id == requester.user_id)
            .collect())
    }

    async fn find_share_of(
        &self,
        document_id: Uuid,
        share_id: Uuid,
    ) -> DocumentResult<DocumentShare> {
        self.ctx
            .store
            .find_share(share_id)
            .await?
            .filter(|share| share.document_id == document_id)
            .ok_or_else(|| DocumentError::share_not_found(share_id))
    }

    /// Revoke a share. Revoking a revoked share returns it unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn revoke(
        &self,
        document_id: Uuid,
        share_id: Uuid,
        requester: &Requester,
    ) -> DocumentResult<DocumentShare> {
        let (doc, shares) = self.ctx.load_active(document_id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).share,
            "only the owner or an administrator can revoke shares",
        )?;

        let share = self.find_share_of(document_id, share_id).await?;
        if share.is_revoked() {
            return Ok(share);
        }

        let revoked = DocumentShare {
            revoked_at: Some(self.ctx.clock.now()),
            revoked_by: Some(requester.user_id),
            ..share
        };
        match self.ctx.store.update_share(&revoked).await? {
            Some(revoked) => {
                tracing::info!(%document_id, %share_id, "share revoked");
                Ok(revoked)
            }
            // Revoked concurrently: return the record that won.
            None => self.find_share_of(document_id, share_id).await,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_permissions(
        &self,
        document_id: Uuid,
        share_id: Uuid,
        patch: PermissionPatch,
        requester: &Requester,
    ) -> DocumentResult<DocumentShare> {
        let (doc, shares) = self.ctx.load_active(document_id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).share,
            "only the owner or an administrator can change share permissions",
        )?;

        let share = self.find_share_of(document_id, share_id).await?;
        if !share.is_active(self.ctx.clock.now()) {
            return Err(DocumentError::Conflict(
                "cannot change permissions on a revoked or expired share".into(),
            ));
        }

        let updated = DocumentShare {
            can_edit: patch.can_edit.unwrap_or(share.can_edit),
            can_delete: patch.can_delete.unwrap_or(share.can_delete),
            ..share
        };
        self.ctx
            .store
            .update_share(&updated)
            .await?
            .ok_or_else(|| {
                DocumentError::Conflict("cannot change permissions on a revoked or expired share".into())
            })
    }
}

fn new_share(
    document_id: Uuid,
    user_id: Uuid,
    options: ShareOptions,
    now: chrono::DateTime<chrono::Utc>,
) -> DocumentShare {
    DocumentShare {
        id: Uuid::now_v7(),
        document_id,
        shared_with_id: user_id,
        can_edit: options.can_edit,
        can_delete: options.can_delete,
        shared_at: now,
        expires_at: options.expires_at,
        revoked_at: None,
        revoked_by: None,
    }
}
