//! Entity store port and its adapters.
//!
//! Every write is a single conditional statement (`mark_trashed`, `set_link`,
//! `update_share`, ...) or one transaction (`purge_document`, `grant_shares`),
//! so concurrent callers are serialized by the store rather than by the
//! managers. Writes only touch the columns they own.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::document::{Document, DocumentFavorite, DocumentShare, DocumentType, LinkKind, LinkTarget};
use crate::error::DocumentResult;
use crate::query::{DocumentQuery, Page, PageRequest, SortField, SortOrder};

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

/// Which documents a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every document (administrators).
    All,
    /// Public, owned, or shared through an active share.
    ViewableBy(Uuid),
    /// Owned, or shared through an active share with `can_delete`.
    DeletableBy(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    /// Trashed strictly after the given instant (the start of the retention
    /// window). A document trashed exactly at it is due for purging instead.
    TrashedSince(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Views,
    Downloads,
}

impl Counter {
    pub fn column(&self) -> &'static str {
        match self {
            Counter::Views => "view_count",
            Counter::Downloads => "download_count",
        }
    }
}

/// Validated metadata changes. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub doc_type: Option<DocumentType>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

/// One user's part of a share batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareGrant {
    /// Granted as a new record, or merged into the user's unrevoked share.
    pub share: DocumentShare,
    /// Expired record to revoke first, already carrying its revocation.
    pub retire: Option<DocumentShare>,
}

/// A fully resolved listing filter.
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    pub scope: Scope,
    pub lifecycle: Lifecycle,
    /// Instant against which share expiry is evaluated.
    pub now: DateTime<Utc>,
    pub favorited_by: Option<Uuid>,
    pub shared_with: Option<Uuid>,
    pub doc_type: Option<DocumentType>,
    pub owner_id: Option<Uuid>,
    pub link_kind: Option<LinkKind>,
    pub linked_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub mime_type: Option<String>,
    pub is_public: Option<bool>,
    pub search: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
}

impl DocumentFilter {
    pub fn new(scope: Scope, lifecycle: Lifecycle, now: DateTime<Utc>) -> Self {
        Self {
            scope,
            lifecycle,
            now,
            favorited_by: None,
            shared_with: None,
            doc_type: None,
            owner_id: None,
            link_kind: None,
            linked_id: None,
            tags: Vec::new(),
            mime_type: None,
            is_public: None,
            search: None,
            sort: SortField::default(),
            order: SortOrder::default(),
        }
    }

    /// Apply the caller's query-string filters. `requester` resolves `sharedWithMe`.
    pub fn with_query(mut self, query: &DocumentQuery, requester: Uuid) -> Self {
        self.doc_type = query.doc_type;
        self.owner_id = query.owner_id;
        self.link_kind = query.entity_type;
        self.linked_id = query.entity_id;
        self.tags = query.tag_list();
        self.mime_type = query
            .mime_type
            .as_deref()
            .map(crate::document::validate::essence)
            .filter(|m| !m.is_empty());
        self.is_public = query.is_public;
        self.search = query.search_term();
        self.sort = query.sort_by.unwrap_or_default();
        self.order = query.order.unwrap_or_default();
        if query.shared_with_me == Some(true) {
            self.shared_with = Some(requester);
        }
        self
    }

    pub fn favorited_by(mut self, user_id: Uuid) -> Self {
        self.favorited_by = Some(user_id);
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Cheap connectivity check for health probes.
    async fn ping(&self) -> DocumentResult<()>;

    async fn insert_document(&self, doc: &Document) -> DocumentResult<()>;

    async fn find_document(&self, id: Uuid) -> DocumentResult<Option<Document>>;

    /// Write the given metadata and `updated_at` on an active document.
    /// Returns the updated document, or `None` when it is missing or trashed.
    async fn update_metadata(
        &self,
        id: Uuid,
        update: &MetadataUpdate,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>>;

    /// Attach `target` to an active document that has no link. Returns `None`
    /// when the document is missing, trashed or already linked.
    async fn set_link(
        &self,
        id: Uuid,
        target: &LinkTarget,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>>;

    /// Detach `current` from an active document still linked to it. Returns
    /// `None` when the document is missing, trashed or linked elsewhere.
    async fn clear_link(
        &self,
        id: Uuid,
        current: &LinkTarget,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>>;

    /// Set `deleted_at` if the document is active. Returns the trashed document,
    /// or `None` when it is missing or already trashed.
    async fn mark_trashed(&self, id: Uuid, at: DateTime<Utc>) -> DocumentResult<Option<Document>>;

    /// Clear `deleted_at` if the document is trashed. Returns the restored
    /// document, or `None` when it is missing or not trashed.
    async fn mark_restored(&self, id: Uuid) -> DocumentResult<Option<Document>>;

    /// Delete the document with its shares and favorites in one transaction.
    /// Returns the removed document, or `None` if it was already gone.
    async fn purge_document(&self, id: Uuid) -> DocumentResult<Option<Document>>;

    /// Ids of trashed documents with `deleted_at` at or before `cutoff`,
    /// optionally restricted to one owner.
    async fn trashed_before(
        &self,
        owner_id: Option<Uuid>,
        cutoff: DateTime<Utc>,
    ) -> DocumentResult<Vec<Uuid>>;

    async fn increment_counter(&self, id: Uuid, counter: Counter) -> DocumentResult<()>;

    async fn list_documents(
        &self,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> DocumentResult<Page<Document>>;

    async fn entity_exists(&self, link: &LinkTarget) -> DocumentResult<bool>;

    async fn user_exists(&self, user_id: Uuid) -> DocumentResult<bool>;

    /// Apply a share batch in one transaction. For each grant the `retire`
    /// record is revoked first, then the share is inserted or, when the user
    /// already holds an unrevoked share of the document, that share takes the
    /// new permissions and expiry. Returns the stored shares in grant order.
    async fn grant_shares(&self, grants: &[ShareGrant]) -> DocumentResult<Vec<DocumentShare>>;

    /// Overwrite permissions, expiry and revocation fields of an unrevoked
    /// share. Returns `None` when it is missing or already revoked.
    async fn update_share(&self, share: &DocumentShare) -> DocumentResult<Option<DocumentShare>>;

    async fn find_share(&self, id: Uuid) -> DocumentResult<Option<DocumentShare>>;

    /// Every share of a document, revoked ones included, oldest first.
    async fn shares_for_document(&self, document_id: Uuid) -> DocumentResult<Vec<DocumentShare>>;

    /// Returns `false` if the favorite already existed.
    async fn insert_favorite(&self, favorite: &DocumentFavorite) -> DocumentResult<bool>;

    /// Returns `false` if there was nothing to delete.
    async fn delete_favorite(&self, document_id: Uuid, user_id: Uuid) -> DocumentResult<bool>;
}
