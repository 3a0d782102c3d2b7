use uuid::Uuid;

use super::{require, ManagerContext};
use crate::document::{Document, DocumentFavorite};
use crate::error::DocumentResult;
use crate::identity::Requester;
use crate::query::{DocumentQuery, Page};
use crate::store::{DocumentFilter, Lifecycle, Scope};

/// Per-user bookmarks. Adding and removing are both idempotent.
#[derive(Clone)]
pub struct FavoriteManager {
    ctx: ManagerContext,
}

impl FavoriteManager {
    pub fn new(ctx: ManagerContext) -> Self {
        Self { ctx }
    }

    pub async fn add_favorite(&self, document_id: Uuid, requester: &Requester) -> DocumentResult<()> {
        let (doc, shares) = self.ctx.load_active(document_id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).view,
            "you do not have access to this document",
        )?;

        let favorite = DocumentFavorite {
            id: Uuid::now_v7(),
            document_id,
            user_id: requester.user_id,
            created_at: self.ctx.clock.now(),
        };
        if !self.ctx.store.insert_favorite(&favorite).await? {
            tracing::debug!(%document_id, "document already in favorites");
        }
        Ok(())
    }

    pub async fn remove_favorite(
        &self,
        document_id: Uuid,
        requester: &Requester,
    ) -> DocumentResult<()> {
        self.ctx
            .store
            .delete_favorite(document_id, requester.user_id)
            .await?;
        Ok(())
    }

    /// The requester's favorites that are still active and still viewable.
    pub async fn list_favorites(
        &self,
        requester: &Requester,
        query: &DocumentQuery,
    ) -> DocumentResult<Page<Document>> {
        let scope = if requester.is_admin() {
            Scope::All
        } else {
            Scope::ViewableBy(requester.user_id)
        };
        let filter = DocumentFilter::new(scope, Lifecycle::Active, self.ctx.clock.now())
            .with_query(query, requester.user_id)
            .favorited_by(requester.user_id);
        self.ctx
            .store
            .list_documents(&filter, query.page_request())
            .await
    }
}
