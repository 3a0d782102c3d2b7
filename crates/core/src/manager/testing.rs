//! Shared fixture for manager tests: in-memory store and files, a manual
//! clock, two researchers and an administrator.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use super::{DocumentSettings, ManagerContext, Managers};
use crate::clock::ManualClock;
use crate::document::{
    Document, DocumentFavorite, DocumentShare, FileMeta, LinkKind, LinkTarget, NewDocument,
    ShareOptions,
};
use crate::error::DocumentResult;
use crate::events::EventBus;
use crate::identity::{Requester, Role};
use crate::storage::{storage_key, FileStorage, MemoryFileStorage};
use crate::query::{Page, PageRequest};
use crate::store::{
    Counter, DocumentFilter, DocumentStore, MemoryDocumentStore, MetadataUpdate, ShareGrant,
};

pub(crate) struct Fixture {
    pub store: Arc<MemoryDocumentStore>,
    pub files: Arc<MemoryFileStorage>,
    pub clock: Arc<ManualClock>,
    pub events: EventBus,
    pub managers: Managers,
    pub context: ManagerContext,
    pub alice: Requester,
    pub bob: Requester,
    pub admin: Requester,
}

impl Fixture {
    pub const CONTENT: &'static [u8] = b"%PDF-1.7 test";

    pub async fn new() -> Self {
        Self::with_settings(DocumentSettings::default()).await
    }

    pub async fn with_retention(retention: Duration) -> Self {
        Self::with_settings(DocumentSettings {
            trash_retention: retention,
            ..DocumentSettings::default()
        })
        .await
    }

    pub async fn with_settings(settings: DocumentSettings) -> Self {
        let store = Arc::new(MemoryDocumentStore::new());
        let files = Arc::new(MemoryFileStorage::new());
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let events = EventBus::new(64);

        let alice = Requester::new(Uuid::new_v4(), Role::Researcher);
        let bob = Requester::new(Uuid::new_v4(), Role::Collaborator);
        let admin = Requester::new(Uuid::new_v4(), Role::Admin);
        for user in [&alice, &bob, &admin] {
            store.add_user(user.user_id).await;
        }

        let context = ManagerContext::new(
            store.clone(),
            files.clone(),
            clock.clone(),
            events.clone(),
            settings,
        );
        Self {
            managers: Managers::new(context.clone()),
            context,
            store,
            files,
            clock,
            events,
            alice,
            bob,
            admin,
        }
    }

    pub fn settings(&self) -> DocumentSettings {
        self.context.settings
    }

    pub fn file_meta(&self, mime_type: &str) -> FileMeta {
        FileMeta {
            original_filename: "upload.bin".into(),
            mime_type: mime_type.into(),
            size_bytes: Self::CONTENT.len() as i64,
            stored_path: storage_key("upload.bin"),
        }
    }

    pub fn new_document(&self, title: &str) -> NewDocument {
        NewDocument {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Store bytes and register a private document owned by `owner`.
    pub async fn upload(&self, owner: &Requester, title: &str, mime_type: &str) -> Document {
        let meta = self.file_meta(mime_type);
        self.files
            .write(&meta.stored_path, Self::CONTENT)
            .await
            .unwrap();
        self.managers
            .documents
            .register(owner, meta, self.new_document(title))
            .await
            .unwrap()
    }

    pub async fn entity(&self, kind: LinkKind) -> LinkTarget {
        let target = LinkTarget::new(kind, Uuid::new_v4());
        self.store.add_entity(target).await;
        target
    }

    pub async fn share_with_bob(
        &self,
        doc: &Document,
        can_edit: bool,
        can_delete: bool,
    ) -> DocumentShare {
        self.managers
            .shares
            .share(
                doc.id,
                &[self.bob.user_id],
                ShareOptions {
                    can_edit,
                    can_delete,
                    expires_at: None,
                },
                &self.alice,
            )
            .await
            .unwrap()
            .remove(0)
    }

    /// Managers over the same state whose reads yield to the scheduler, so
    /// calls joined on one task interleave between their read and write.
    pub fn interleaving_managers(&self) -> Managers {
        Managers::new(ManagerContext {
            store: Arc::new(YieldingStore(self.store.clone())),
            ..self.context.clone()
        })
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        crate::clock::Clock::now(self.clock.as_ref())
    }

    pub async fn store_share(&self, id: Uuid) -> DocumentShare {
        self.store.find_share(id)
            .await
            .unwrap()
            .unwrap()
    }
}

/// Delegates to the memory store, yielding after every document and share read.
struct YieldingStore(Arc<MemoryDocumentStore>);

#[async_trait]
impl DocumentStore for YieldingStore {
    async fn ping(&self) -> DocumentResult<()> {
        self.0.ping().await
    }

    async fn insert_document(&self, doc: &Document) -> DocumentResult<()> {
        self.0.insert_document(doc).await
    }

    async fn find_document(&self, id: Uuid) -> DocumentResult<Option<Document>> {
        let found = self.0.find_document(id).await;
        tokio::task::yield_now().await;
        found
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        update: &MetadataUpdate,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>> {
        self.0.update_metadata(id, update, at).await
    }

    async fn set_link(
        &self,
        id: Uuid,
        target: &LinkTarget,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>> {
        self.0.set_link(id, target, at).await
    }

    async fn clear_link(
        &self,
        id: Uuid,
        current: &LinkTarget,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>> {
        self.0.clear_link(id, current, at).await
    }

    async fn mark_trashed(&self, id: Uuid, at: DateTime<Utc>) -> DocumentResult<Option<Document>> {
        self.0.mark_trashed(id, at).await
    }

    async fn mark_restored(&self, id: Uuid) -> DocumentResult<Option<Document>> {
        self.0.mark_restored(id).await
    }

    async fn purge_document(&self, id: Uuid) -> DocumentResult<Option<Document>> {
        self.0.purge_document(id).await
    }

    async fn trashed_before(
        &self,
        owner_id: Option<Uuid>,
        cutoff: DateTime<Utc>,
    ) -> DocumentResult<Vec<Uuid>> {
        self.0.trashed_before(owner_id, cutoff).await
    }

    async fn increment_counter(&self, id: Uuid, counter: Counter) -> DocumentResult<()> {
        self.0.increment_counter(id, counter).await
    }

    async fn list_documents(
        &self,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> DocumentResult<Page<Document>> {
        self.0.list_documents(filter, page).await
    }

    async fn entity_exists(&self, link: &LinkTarget) -> DocumentResult<bool> {
        self.0.entity_exists(link).await
    }

    async fn user_exists(&self, user_id: Uuid) -> DocumentResult<bool> {
        self.0.user_exists(user_id).await
    }

    async fn grant_shares(&self, grants: &[ShareGrant]) -> DocumentResult<Vec<DocumentShare>> {
        self.0.grant_shares(grants).await
    }

    async fn update_share(&self, share: &DocumentShare) -> DocumentResult<Option<DocumentShare>> {
        self.0.update_share(share).await
    }

    async fn find_share(&self, id: Uuid) -> DocumentResult<Option<DocumentShare>> {
        self.0.find_share(id).await
    }

    async fn shares_for_document(&self, document_id: Uuid) -> DocumentResult<Vec<DocumentShare>> {
        let shares = self.0.shares_for_document(document_id).await;
        tokio::task::yield_now().await;
        shares
    }

    async fn insert_favorite(&self, favorite: &DocumentFavorite) -> DocumentResult<bool> {
        self.0.insert_favorite(favorite).await
    }

    async fn delete_favorite(&self, document_id: Uuid, user_id: Uuid) -> DocumentResult<bool> {
        self.0.delete_favorite(document_id, user_id).await
    }
}
