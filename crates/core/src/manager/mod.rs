//! Document lifecycle, sharing and favorites managers.
//!
//! Each manager is built from a [`ManagerContext`] holding the store handle,
//! file storage, clock and event bus. Authorization is re-evaluated on every
//! call from freshly loaded shares.

pub mod favorites;
pub mod lifecycle;
pub mod sharing;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::access::Access;
use crate::clock::Clock;
use crate::document::{Document, DocumentShare};
use crate::error::{DocumentError, DocumentResult};
use crate::events::{DocumentActivity, DocumentEvent, EventBus};
use crate::identity::Requester;
use crate::storage::FileStorage;
use crate::store::DocumentStore;

pub use favorites::FavoriteManager;
pub use lifecycle::DocumentManager;
pub use sharing::ShareManager;

pub const DEFAULT_TRASH_RETENTION_DAYS: i64 = 30;
pub const DEFAULT_MAX_TAGS: usize = 20;

/// Tunables for the managers.
#[derive(Debug, Clone, Copy)]
pub struct DocumentSettings {
    /// How long a trashed document stays restorable before the sweep may purge it.
    pub trash_retention: Duration,
    pub max_tags: usize,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            trash_retention: Duration::days(DEFAULT_TRASH_RETENTION_DAYS),
            max_tags: DEFAULT_MAX_TAGS,
        }
    }
}

/// Shared dependencies of the managers.
#[derive(Clone)]
pub struct ManagerContext {
    pub store: Arc<dyn DocumentStore>,
    pub files: Arc<dyn FileStorage>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
    pub settings: DocumentSettings,
}

impl ManagerContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        files: Arc<dyn FileStorage>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        settings: DocumentSettings,
    ) -> Self {
        Self {
            store,
            files,
            clock,
            events,
            settings,
        }
    }

    /// Load a document in any lifecycle state, with all of its shares.
    pub(crate) async fn load(&self, id: Uuid) -> DocumentResult<(Document, Vec<DocumentShare>)> {
        let doc = self
            .store
            .find_document(id)
            .await?
            .ok_or_else(|| DocumentError::document_not_found(id))?;
        let shares = self.store.shares_for_document(id).await?;
        Ok((doc, shares))
    }

    /// Load a document that is not in the trash.
    pub(crate) async fn load_active(
        &self,
        id: Uuid,
    ) -> DocumentResult<(Document, Vec<DocumentShare>)> {
        let (doc, shares) = self.load(id).await?;
        if doc.is_trashed() {
            return Err(DocumentError::document_not_found(id));
        }
        Ok((doc, shares))
    }

    pub(crate) fn access(
        &self,
        requester: &Requester,
        doc: &Document,
        shares: &[DocumentShare],
    ) -> Access {
        Access::evaluate(requester, doc, shares, self.clock.now())
    }

    pub(crate) fn activity(&self, document_id: Uuid, actor: Option<Uuid>) -> DocumentActivity {
        DocumentActivity {
            document_id,
            actor_id: actor,
            timestamp: self.clock.now(),
        }
    }

    /// Remove the document rows, then its file. A file that cannot be removed
    /// is logged and left orphaned; the rows are gone either way.
    pub(crate) async fn purge(&self, id: Uuid, actor: Option<Uuid>) -> DocumentResult<bool> {
        let Some(doc) = self.store.purge_document(id).await? else {
            return Ok(false);
        };

        if let Err(e) = self.files.delete(&doc.storage_path).await {
            tracing::warn!(
                document_id = %doc.id,
                path = %doc.storage_path,
                error = %e,
                "unable to remove stored file for purged document"
            );
        }

        tracing::info!(document_id = %doc.id, "document purged");
        self.events
            .notify(DocumentEvent::Purged(self.activity(doc.id, actor)));
        Ok(true)
    }
}

/// Turn a negative policy decision into an authorization error.
pub(crate) fn require(allowed: bool, action: &'static str) -> DocumentResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(DocumentError::Forbidden(action))
    }
}

/// All three managers over one context.
#[derive(Clone)]
pub struct Managers {
    pub documents: DocumentManager,
    pub shares: ShareManager,
    pub favorites: FavoriteManager,
}

impl Managers {
    pub fn new(context: ManagerContext) -> Self {
        Self {
            documents: DocumentManager::new(context.clone()),
            shares: ShareManager::new(context.clone()),
            favorites: FavoriteManager::new(context),
        }
    }
}
