//! In-process store used by tests and local tooling.
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Counter, DocumentFilter, DocumentStore, Lifecycle, MetadataUpdate, Scope, ShareGrant};
use crate::access;
use crate::document::{Document, DocumentFavorite, DocumentShare, LinkTarget};
use crate::error::{DocumentError, DocumentResult};
use crate::identity::{Requester, Role};
use crate::query::{Page, PageRequest, SortField, SortOrder};

#[derive(Debug, Default)]
struct State {
    documents: HashMap<Uuid, Document>,
    shares: Vec<DocumentShare>,
    favorites: Vec<DocumentFavorite>,
    users: HashSet<Uuid>,
    entities: HashSet<LinkTarget>,
}

impl State {
    fn active_document(&mut self, id: Uuid) -> Option<&mut Document> {
        self.documents
            .get_mut(&id)
            .filter(|doc| doc.deleted_at.is_none())
    }

    fn shares_of(&self, document_id: Uuid) -> Vec<DocumentShare> {
        self.shares
            .iter()
            .filter(|share| share.document_id == document_id)
            .cloned()
            .collect()
    }

    fn has_active_share(&self, doc: &Document, user: Uuid, now: DateTime<Utc>) -> bool {
        self.shares.iter().any(|share| {
            share.document_id == doc.id && share.shared_with_id == user && share.is_active(now)
        })
    }

    fn matches(&self, doc: &Document, filter: &DocumentFilter) -> bool {
        let lifecycle = match filter.lifecycle {
            Lifecycle::Active => doc.deleted_at.is_none(),
            Lifecycle::TrashedSince(since) => doc.deleted_at.is_some_and(|at| at > since),
        };
        if !lifecycle {
            return false;
        }

        let shares = self.shares_of(doc.id);
        let in_scope = match filter.scope {
            Scope::All => true,
            Scope::ViewableBy(user) => {
                access::can_view(&Requester::new(user, Role::Collaborator), doc, &shares, filter.now)
            }
            Scope::DeletableBy(user) => access::can_delete(
                &Requester::new(user, Role::Collaborator),
                doc,
                &shares,
                filter.now,
            ),
        };
        if !in_scope {
            return false;
        }

        if let Some(user) = filter.shared_with {
            if !self.has_active_share(doc, user, filter.now) {
                return false;
            }
        }
        if let Some(user) = filter.favorited_by {
            let favorited = self
                .favorites
                .iter()
                .any(|fav| fav.document_id == doc.id && fav.user_id == user);
            if !favorited {
                return false;
            }
        }

        let linked = match (filter.link_kind, filter.linked_id) {
            (_, None) => true,
            (Some(kind), Some(id)) => doc.link == Some(LinkTarget::new(kind, id)),
            (None, Some(id)) => doc.link.is_some_and(|link| link.id == id),
        };

        linked
            && filter.doc_type.is_none_or(|ty| doc.doc_type == ty)
            && filter.owner_id.is_none_or(|owner| doc.owner_id == owner)
            && filter.is_public.is_none_or(|public| doc.is_public == public)
            && filter
                .mime_type
                .as_deref()
                .is_none_or(|mime| doc.mime_type == mime)
            && (filter.tags.is_empty() || filter.tags.iter().any(|tag| doc.tags.contains(tag)))
            && filter.search.as_deref().is_none_or(|term| {
                doc.title.to_lowercase().contains(&term.to_lowercase())
            })
    }
}

fn compare(a: &Document, b: &Document, sort: SortField) -> Ordering {
    match sort {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Title => a.title.cmp(&b.title),
        SortField::Size => a.size_bytes.cmp(&b.size_bytes),
        SortField::DownloadCount => a.download_count.cmp(&b.download_count),
        SortField::ViewCount => a.view_count.cmp(&b.view_count),
    }
    .then_with(|| a.id.cmp(&b.id))
}

/// [`DocumentStore`] kept entirely in memory behind a `tokio` lock.
///
/// Users and owning entities must be registered with [`add_user`] and
/// [`add_entity`] before they can be shared with or linked to.
///
/// [`add_user`]: MemoryDocumentStore::add_user
/// [`add_entity`]: MemoryDocumentStore::add_entity
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    state: RwLock<State>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: Uuid) {
        self.state.write().await.users.insert(user_id);
    }

    pub async fn add_entity(&self, link: LinkTarget) {
        self.state.write().await.entities.insert(link);
    }

    pub async fn remove_entity(&self, link: &LinkTarget) {
        self.state.write().await.entities.remove(link);
    }

    pub async fn favorite_count(&self, document_id: Uuid) -> usize {
        self.state
            .read()
            .await
            .favorites
            .iter()
            .filter(|fav| fav.document_id == document_id)
            .count()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ping(&self) -> DocumentResult<()> {
        Ok(())
    }

    async fn insert_document(&self, doc: &Document) -> DocumentResult<()> {
        let mut state = self.state.write().await;
        if state.documents.contains_key(&doc.id) {
            return Err(DocumentError::Conflict(format!("document {} already exists", doc.id)));
        }
        state.documents.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> DocumentResult<Option<Document>> {
        Ok(self.state.read().await.documents.get(&id).cloned())
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        update: &MetadataUpdate,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>> {
        let mut state = self.state.write().await;
        Ok(state.active_document(id).map(|doc| {
            if let Some(title) = &update.title {
                doc.title = title.clone();
            }
            if let Some(description) = &update.description {
                doc.description = description.clone();
            }
            if let Some(doc_type) = update.doc_type {
                doc.doc_type = doc_type;
            }
            if let Some(tags) = &update.tags {
                doc.tags = tags.clone();
            }
            if let Some(is_public) = update.is_public {
                doc.is_public = is_public;
            }
            doc.updated_at = at;
            doc.clone()
        }))
    }

    async fn set_link(
        &self,
        id: Uuid,
        target: &LinkTarget,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>> {
        let mut state = self.state.write().await;
        Ok(state
            .active_document(id)
            .filter(|doc| doc.link.is_none())
            .map(|doc| {
                doc.link = Some(*target);
                doc.updated_at = at;
                doc.clone()
            }))
    }

    async fn clear_link(
        &self,
        id: Uuid,
        current: &LinkTarget,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>> {
        let mut state = self.state.write().await;
        Ok(state
            .active_document(id)
            .filter(|doc| doc.link.as_ref() == Some(current))
            .map(|doc| {
                doc.link = None;
                doc.updated_at = at;
                doc.clone()
            }))
    }

    async fn mark_trashed(&self, id: Uuid, at: DateTime<Utc>) -> DocumentResult<Option<Document>> {
        let mut state = self.state.write().await;
        Ok(state
            .documents
            .get_mut(&id)
            .filter(|doc| doc.deleted_at.is_none())
            .map(|doc| {
                doc.deleted_at = Some(at);
                doc.clone()
            }))
    }

    async fn mark_restored(&self, id: Uuid) -> DocumentResult<Option<Document>> {
        let mut state = self.state.write().await;
        Ok(state
            .documents
            .get_mut(&id)
            .filter(|doc| doc.deleted_at.is_some())
            .map(|doc| {
                doc.deleted_at = None;
                doc.clone()
            }))
    }

    async fn purge_document(&self, id: Uuid) -> DocumentResult<Option<Document>> {
        let mut state = self.state.write().await;
        let removed = state.documents.remove(&id);
        if removed.is_some() {
            state.shares.retain(|share| share.document_id != id);
            state.favorites.retain(|fav| fav.document_id != id);
        }
        Ok(removed)
    }

    async fn trashed_before(
        &self,
        owner_id: Option<Uuid>,
        cutoff: DateTime<Utc>,
    ) -> DocumentResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut expired: Vec<&Document> = state
            .documents
            .values()
            .filter(|doc| doc.deleted_at.is_some_and(|at| at <= cutoff))
            .filter(|doc| owner_id.is_none_or(|owner| doc.owner_id == owner))
            .collect();
        expired.sort_by_key(|doc| doc.deleted_at);
        Ok(expired.into_iter().map(|doc| doc.id).collect())
    }

    async fn increment_counter(&self, id: Uuid, counter: Counter) -> DocumentResult<()> {
        let mut state = self.state.write().await;
        if let Some(doc) = state.documents.get_mut(&id) {
            match counter {
                Counter::Views => doc.view_count += 1,
                Counter::Downloads => doc.download_count += 1,
            }
        }
        Ok(())
    }

    async fn list_documents(
        &self,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> DocumentResult<Page<Document>> {
        let state = self.state.read().await;
        let mut matching: Vec<&Document> = state
            .documents
            .values()
            .filter(|doc| state.matches(doc, filter))
            .collect();
        matching.sort_by(|a, b| match filter.order {
            SortOrder::Asc => compare(a, b, filter.sort),
            SortOrder::Desc => compare(b, a, filter.sort),
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn entity_exists(&self, link: &LinkTarget) -> DocumentResult<bool> {
        Ok(self.state.read().await.entities.contains(link))
    }

    async fn user_exists(&self, user_id: Uuid) -> DocumentResult<bool> {
        Ok(self.state.read().await.users.contains(&user_id))
    }

    async fn grant_shares(&self, grants: &[ShareGrant]) -> DocumentResult<Vec<DocumentShare>> {
        let mut state = self.state.write().await;
        let mut granted = Vec::with_capacity(grants.len());
        for grant in grants {
            if let Some(retired) = &grant.retire {
                if let Some(stored) = state
                    .shares
                    .iter_mut()
                    .find(|share| share.id == retired.id && !share.is_revoked())
                {
                    stored.revoked_at = retired.revoked_at;
                    stored.revoked_by = retired.revoked_by;
                }
            }

            let fresh = &grant.share;
            let live = state.shares.iter().position(|share| {
                share.document_id == fresh.document_id
                    && share.shared_with_id == fresh.shared_with_id
                    && !share.is_revoked()
            });
            match live {
                Some(index) => {
                    let stored = &mut state.shares[index];
                    stored.can_edit = fresh.can_edit;
                    stored.can_delete = fresh.can_delete;
                    stored.expires_at = fresh.expires_at;
                    granted.push(stored.clone());
                }
                None => {
                    state.shares.push(fresh.clone());
                    granted.push(fresh.clone());
                }
            }
        }
        Ok(granted)
    }

    async fn update_share(&self, share: &DocumentShare) -> DocumentResult<Option<DocumentShare>> {
        let mut state = self.state.write().await;
        Ok(state
            .shares
            .iter_mut()
            .find(|stored| stored.id == share.id && !stored.is_revoked())
            .map(|stored| {
                stored.can_edit = share.can_edit;
                stored.can_delete = share.can_delete;
                stored.expires_at = share.expires_at;
                stored.revoked_at = share.revoked_at;
                stored.revoked_by = share.revoked_by;
                stored.clone()
            }))
    }

    async fn find_share(&self, id: Uuid) -> DocumentResult<Option<DocumentShare>> {
        Ok(self
            .state
            .read()
            .await
            .shares
            .iter()
            .find(|share| share.id == id)
            .cloned())
    }

    async fn shares_for_document(&self, document_id: Uuid) -> DocumentResult<Vec<DocumentShare>> {
        Ok(self.state.read().await.shares_of(document_id))
    }

    async fn insert_favorite(&self, favorite: &DocumentFavorite) -> DocumentResult<bool> {
        let mut state = self.state.write().await;
        let exists = state.favorites.iter().any(|fav| {
            fav.document_id == favorite.document_id && fav.user_id == favorite.user_id
        });
        if exists {
            return Ok(false);
        }
        state.favorites.push(favorite.clone());
        Ok(true)
    }

    async fn delete_favorite(&self, document_id: Uuid, user_id: Uuid) -> DocumentResult<bool> {
        let mut state = self.state.write().await;
        let before = state.favorites.len();
        state
            .favorites
            .retain(|fav| !(fav.document_id == document_id && fav.user_id == user_id));
        Ok(state.favorites.len() != before)
    }
}
