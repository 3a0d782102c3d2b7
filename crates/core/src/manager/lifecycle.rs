use uuid::Uuid;

use super::{require, ManagerContext};
use crate::document::validate::{
    document_type_for_mime, essence, normalize_tags, single_link, validate_description,
    validate_title,
};
use crate::document::{
    Document, FileMeta, LinkTarget, MetadataPatch, NewDocument, UnlinkRequest,
};
use crate::error::{DocumentError, DocumentResult};
use crate::events::DocumentEvent;
use crate::identity::Requester;
use crate::query::{DocumentQuery, Page};
use crate::store::{Counter, DocumentFilter, Lifecycle, MetadataUpdate, Scope};

/// Owns a document's state machine: ACTIVE -> TRASHED -> PURGED, with
/// restore from TRASHED and direct purge from ACTIVE.
#[derive(Clone)]
pub struct DocumentManager {
    ctx: ManagerContext,
}

fn already_linked(current: LinkTarget) -> DocumentError {
    DocumentError::Conflict(format!(
        "document is already linked to {} {}; unlink it first",
        current.kind, current.id
    ))
}

fn linked_elsewhere(current: LinkTarget) -> DocumentError {
    DocumentError::Conflict(format!(
        "document is linked to {} {}, not to the given entity",
        current.kind, current.id
    ))
}

impl DocumentManager {
    pub fn new(ctx: ManagerContext) -> Self {
        Self { ctx }
    }

    /// Re-read a document after a conditional write matched nothing.
    async fn reload_active(&self, id: Uuid) -> DocumentResult<Document> {
        self.ctx
            .store
            .find_document(id)
            .await?
            .filter(|doc| !doc.is_trashed())
            .ok_or_else(|| DocumentError::document_not_found(id))
    }

    async fn ensure_entity(&self, link: &LinkTarget) -> DocumentResult<()> {
        if self.ctx.store.entity_exists(link).await? {
            Ok(())
        } else {
            Err(DocumentError::NotFound(format!("{} {}", link.kind, link.id)))
        }
    }

    /// Register a stored upload as a new active document owned by `requester`.
    #[tracing::instrument(skip(self, file, input), fields(owner = %requester.user_id))]
    pub async fn register(
        &self,
        requester: &Requester,
        file: FileMeta,
        input: NewDocument,
    ) -> DocumentResult<Document> {
        let title = validate_title(&input.title)?;
        let description = validate_description(input.description.as_deref())?;
        let tags = normalize_tags(&input.tags, self.ctx.settings.max_tags)?;
        // The MIME type is checked even when the caller picked a type.
        let inferred = document_type_for_mime(&file.mime_type)?;
        let link = single_link(&input.links)?;
        if let Some(link) = &link {
            self.ensure_entity(link).await?;
        }

        let now = self.ctx.clock.now();
        let doc = Document {
            id: Uuid::now_v7(),
            title,
            description,
            doc_type: input.doc_type.unwrap_or(inferred),
            storage_path: file.stored_path,
            original_filename: file.original_filename,
            size_bytes: file.size_bytes,
            mime_type: essence(&file.mime_type),
            tags,
            is_public: input.is_public,
            owner_id: requester.user_id,
            link,
            view_count: 0,
            download_count: 0,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.ctx.store.insert_document(&doc).await?;

        tracing::info!(document_id = %doc.id, doc_type = doc.doc_type.as_str(), "document registered");
        self.ctx.events.notify(DocumentEvent::Uploaded(
            self.ctx.activity(doc.id, Some(requester.user_id)),
        ));
        Ok(doc)
    }

    /// Fetch a viewable, non-trashed document and count the view.
    pub async fn get(&self, id: Uuid, requester: &Requester) -> DocumentResult<Document> {
        let (mut doc, shares) = self.ctx.load_active(id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).view,
            "you do not have access to this document",
        )?;
        self.ctx.store.increment_counter(id, Counter::Views).await?;
        doc.view_count += 1;
        Ok(doc)
    }

    /// Read a viewable document's bytes and count the download.
    pub async fn download(
        &self,
        id: Uuid,
        requester: &Requester,
    ) -> DocumentResult<(Document, Vec<u8>)> {
        let (mut doc, shares) = self.ctx.load_active(id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).view,
            "you do not have access to this document",
        )?;
        let bytes = self.ctx.files.read(&doc.storage_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocumentError::NotFound(format!("stored file for document {id}"))
            } else {
                DocumentError::Storage(e)
            }
        })?;
        self.ctx.store.increment_counter(id, Counter::Downloads).await?;
        doc.download_count += 1;
        Ok((doc, bytes))
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update_metadata(
        &self,
        id: Uuid,
        patch: MetadataPatch,
        requester: &Requester,
    ) -> DocumentResult<Document> {
        let (doc, shares) = self.ctx.load_active(id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).edit,
            "you cannot edit this document",
        )?;
        if let Some(link) = &doc.link {
            self.ensure_entity(link).await?;
        }
        if patch.is_empty() {
            return Ok(doc);
        }

        let update = MetadataUpdate {
            title: patch.title.as_deref().map(validate_title).transpose()?,
            description: patch
                .description
                .as_deref()
                .map(|description| validate_description(Some(description)))
                .transpose()?,
            doc_type: patch.doc_type,
            tags: patch
                .tags
                .as_deref()
                .map(|tags| normalize_tags(tags, self.ctx.settings.max_tags))
                .transpose()?,
            is_public: patch.is_public,
        };

        self.ctx
            .store
            .update_metadata(id, &update, self.ctx.clock.now())
            .await?
            .ok_or_else(|| DocumentError::document_not_found(id))
    }

    /// Attach the document to an owning entity. Re-linking to the current
    /// target is a no-op; any other existing link must be removed first.
    #[tracing::instrument(skip(self))]
    pub async fn link(
        &self,
        id: Uuid,
        target: LinkTarget,
        requester: &Requester,
    ) -> DocumentResult<Document> {
        let (doc, shares) = self.ctx.load_active(id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).edit,
            "you cannot edit this document",
        )?;

        match doc.link {
            Some(current) if current == target => return Ok(doc),
            Some(current) => return Err(already_linked(current)),
            None => {}
        }

        self.ensure_entity(&target).await?;
        if let Some(linked) = self
            .ctx
            .store
            .set_link(id, &target, self.ctx.clock.now())
            .await?
        {
            return Ok(linked);
        }

        // Someone else linked, trashed or purged it in between.
        let current = self.reload_active(id).await?;
        match current.link {
            Some(link) if link == target => Ok(current),
            Some(link) => Err(already_linked(link)),
            None => Err(DocumentError::Conflict(
                "document changed while linking; try again".into(),
            )),
        }
    }

    /// Detach the document from its owning entity. With no entity given,
    /// whatever link is set is cleared; with no link set this is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn unlink(
        &self,
        id: Uuid,
        request: UnlinkRequest,
        requester: &Requester,
    ) -> DocumentResult<Document> {
        let (doc, shares) = self.ctx.load_active(id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).edit,
            "you cannot edit this document",
        )?;

        let Some(current) = doc.link else {
            return Ok(doc);
        };
        let mismatch = request.kind.is_some_and(|kind| kind != current.kind)
            || request.id.is_some_and(|entity| entity != current.id);
        if mismatch {
            return Err(linked_elsewhere(current));
        }

        if let Some(unlinked) = self
            .ctx
            .store
            .clear_link(id, &current, self.ctx.clock.now())
            .await?
        {
            return Ok(unlinked);
        }

        let latest = self.reload_active(id).await?;
        match latest.link {
            None => Ok(latest),
            Some(link) => Err(linked_elsewhere(link)),
        }
    }

    /// Move the document to the trash. Trashing a trashed document succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn soft_delete(&self, id: Uuid, requester: &Requester) -> DocumentResult<Document> {
        let (doc, shares) = self.ctx.load(id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).delete,
            "you cannot delete this document",
        )?;
        if doc.is_trashed() {
            return Ok(doc);
        }

        match self.ctx.store.mark_trashed(id, self.ctx.clock.now()).await? {
            Some(trashed) => {
                self.ctx.events.notify(DocumentEvent::Trashed(
                    self.ctx.activity(id, Some(requester.user_id)),
                ));
                Ok(trashed)
            }
            // Lost a race: someone else trashed or purged it in between.
            None => self
                .ctx
                .store
                .find_document(id)
                .await?
                .filter(Document::is_trashed)
                .ok_or_else(|| DocumentError::document_not_found(id)),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn restore(&self, id: Uuid, requester: &Requester) -> DocumentResult<Document> {
        let (doc, shares) = self.ctx.load(id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).delete,
            "you cannot restore this document",
        )?;
        if !doc.is_trashed() {
            return Err(DocumentError::Conflict("document is not in the trash".into()));
        }

        match self.ctx.store.mark_restored(id).await? {
            Some(restored) => {
                self.ctx.events.notify(DocumentEvent::Restored(
                    self.ctx.activity(id, Some(requester.user_id)),
                ));
                Ok(restored)
            }
            None => match self.ctx.store.find_document(id).await? {
                Some(_) => Err(DocumentError::Conflict("document is not in the trash".into())),
                None => Err(DocumentError::document_not_found(id)),
            },
        }
    }

    /// Irreversibly remove the document, its shares, its favorites and its file.
    #[tracing::instrument(skip(self))]
    pub async fn permanent_delete(&self, id: Uuid, requester: &Requester) -> DocumentResult<()> {
        let (doc, shares) = self.ctx.load(id).await?;
        require(
            self.ctx.access(requester, &doc, &shares).delete,
            "you cannot delete this document",
        )?;
        if self.ctx.purge(id, Some(requester.user_id)).await? {
            Ok(())
        } else {
            Err(DocumentError::document_not_found(id))
        }
    }

    /// Purge trash older than the retention window. Administrators sweep every
    /// owner's trash, everyone else only their own. Returns the purge count.
    #[tracing::instrument(skip(self), fields(user = %requester.user_id))]
    pub async fn empty_trash(&self, requester: &Requester) -> DocumentResult<usize> {
        let owner = (!requester.is_admin()).then_some(requester.user_id);
        self.purge_expired(owner, Some(requester.user_id)).await
    }

    /// The scheduled sweep: purge every owner's expired trash.
    pub async fn sweep_trash(&self) -> DocumentResult<usize> {
        self.purge_expired(None, None).await
    }

    async fn purge_expired(&self, owner: Option<Uuid>, actor: Option<Uuid>) -> DocumentResult<usize> {
        let cutoff = self.ctx.clock.now() - self.ctx.settings.trash_retention;
        let expired = self.ctx.store.trashed_before(owner, cutoff).await?;

        // Each purge is its own transaction, so an interrupted sweep simply
        // resumes with whatever is left on the next run.
        let mut purged = 0;
        for id in expired {
            if self.ctx.purge(id, actor).await? {
                purged += 1;
            }
        }

        tracing::info!(purged, %cutoff, "trash emptied");
        Ok(purged)
    }

    pub async fn list(
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
            .with_query(query, requester.user_id);
        self.ctx
            .store
            .list_documents(&filter, query.page_request())
            .await
    }

    /// Trashed documents still inside the retention window that the
    /// requester may restore or purge.
    pub async fn list_trash(
        &self,
        requester: &Requester,
        query: &DocumentQuery,
    ) -> DocumentResult<Page<Document>> {
        let now = self.ctx.clock.now();
        let scope = if requester.is_admin() {
            Scope::All
        } else {
            Scope::DeletableBy(requester.user_id)
        };
        let filter = DocumentFilter::new(
            scope,
            Lifecycle::TrashedSince(now - self.ctx.settings.trash_retention),
            now,
        )
        .with_query(query, requester.user_id);
        self.ctx
            .store
            .list_documents(&filter, query.page_request())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentState, DocumentType, LinkKind};
    use crate::manager::testing::Fixture;
    use crate::query::{SortField, SortOrder};
    use crate::storage::FileStorage;
    use crate::store::DocumentStore;
    use crate::ValidationError;
    use chrono::Duration;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn register_infers_type_and_owner() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Spectre RMN", "image/png").await;

        assert_eq!(doc.owner_id, fx.alice.user_id);
        assert_eq!(doc.doc_type, DocumentType::Image);
        assert_eq!(doc.state(), DocumentState::Active);
        assert!(!doc.is_public);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let fx = Fixture::new().await;
        let documents = &fx.managers.documents;

        let blank = documents
            .register(&fx.alice, fx.file_meta("application/pdf"), fx.new_document("  "))
            .await;
        assert!(matches!(
            blank,
            Err(DocumentError::Validation(ValidationError::EmptyTitle))
        ));

        let exe = documents
            .register(
                &fx.alice,
                fx.file_meta("application/x-msdownload"),
                NewDocument {
                    doc_type: Some(DocumentType::Report),
                    ..fx.new_document("Installer")
                },
            )
            .await;
        assert!(matches!(
            exe,
            Err(DocumentError::Validation(ValidationError::UnsupportedMimeType(_)))
        ));
    }

    #[tokio::test]
    async fn register_accepts_at_most_one_existing_link() {
        let fx = Fixture::new().await;
        let documents = &fx.managers.documents;
        let activity = fx.entity(LinkKind::Activity).await;
        let project = fx.entity(LinkKind::Project).await;

        let two = documents
            .register(
                &fx.alice,
                fx.file_meta("application/pdf"),
                NewDocument {
                    links: vec![activity, project],
                    ..fx.new_document("Compte rendu")
                },
            )
            .await;
        assert!(matches!(
            two,
            Err(DocumentError::Validation(ValidationError::MultipleLinkTargets))
        ));

        let ghost = LinkTarget::new(LinkKind::Task, Uuid::new_v4());
        let missing = documents
            .register(
                &fx.alice,
                fx.file_meta("application/pdf"),
                NewDocument {
                    links: vec![ghost],
                    ..fx.new_document("Compte rendu")
                },
            )
            .await;
        assert!(matches!(missing, Err(DocumentError::NotFound(_))));

        let linked = assert_ok!(
            documents
                .register(
                    &fx.alice,
                    fx.file_meta("application/pdf"),
                    NewDocument {
                        links: vec![activity],
                        ..fx.new_document("Compte rendu")
                    },
                )
                .await
        );
        assert_eq!(linked.link, Some(activity));
    }

    #[tokio::test]
    async fn get_counts_views_and_checks_access() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Protocole", "application/pdf").await;
        let documents = &fx.managers.documents;

        let seen = assert_ok!(documents.get(doc.id, &fx.alice).await);
        assert_eq!(seen.view_count, 1);

        let denied = documents.get(doc.id, &fx.bob).await;
        assert!(matches!(denied, Err(DocumentError::Forbidden(_))));

        let admin_view = assert_ok!(documents.get(doc.id, &fx.admin).await);
        assert_eq!(admin_view.view_count, 2);
    }

    #[tokio::test]
    async fn download_reads_bytes_and_counts() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Données brutes", "text/csv").await;

        let (doc, bytes) = assert_ok!(fx.managers.documents.download(doc.id, &fx.alice).await);
        assert_eq!(bytes, Fixture::CONTENT);
        assert_eq!(doc.download_count, 1);
    }

    #[tokio::test]
    async fn update_metadata_merges_provided_fields() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Brouillon", "application/pdf").await;

        let patch = MetadataPatch {
            title: Some("Rapport final".into()),
            tags: Some(vec!["bilan".into(), "bilan".into(), "2026".into()]),
            doc_type: Some(DocumentType::Report),
            ..Default::default()
        };
        let updated = assert_ok!(
            fx.managers
                .documents
                .update_metadata(doc.id, patch, &fx.alice)
                .await
        );

        assert_eq!(updated.title, "Rapport final");
        assert_eq!(updated.tags, vec!["bilan", "2026"]);
        assert_eq!(updated.doc_type, DocumentType::Report);
        assert_eq!(updated.is_public, doc.is_public);
        assert_eq!(updated.description, doc.description);
    }

    #[tokio::test]
    async fn update_metadata_caps_tags() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Brouillon", "application/pdf").await;
        let too_many: Vec<String> = (0..=fx.settings().max_tags).map(|i| format!("tag{i}")).collect();

        let result = fx
            .managers
            .documents
            .update_metadata(
                doc.id,
                MetadataPatch {
                    tags: Some(too_many),
                    ..Default::default()
                },
                &fx.alice,
            )
            .await;
        assert!(matches!(
            result,
            Err(DocumentError::Validation(ValidationError::TooManyTags { .. }))
        ));
    }

    #[tokio::test]
    async fn update_metadata_fails_when_linked_entity_vanished() {
        let fx = Fixture::new().await;
        let seminar = fx.entity(LinkKind::Seminar).await;
        let doc = fx.upload(&fx.alice, "Support", "application/pdf").await;
        assert_ok!(fx.managers.documents.link(doc.id, seminar, &fx.alice).await);

        fx.store.remove_entity(&seminar).await;
        let result = fx
            .managers
            .documents
            .update_metadata(
                doc.id,
                MetadataPatch {
                    title: Some("Support v2".into()),
                    ..Default::default()
                },
                &fx.alice,
            )
            .await;
        assert!(matches!(result, Err(DocumentError::NotFound(_))));
    }

    #[tokio::test]
    async fn relinking_requires_unlink_first() {
        let fx = Fixture::new().await;
        let documents = &fx.managers.documents;
        let act1 = fx.entity(LinkKind::Activity).await;
        let act2 = fx.entity(LinkKind::Activity).await;
        let doc = fx.upload(&fx.alice, "Fiche activité", "application/pdf").await;

        assert_ok!(documents.link(doc.id, act1, &fx.alice).await);
        assert_ok!(documents.link(doc.id, act1, &fx.alice).await);

        let conflict = documents.link(doc.id, act2, &fx.alice).await;
        assert!(matches!(conflict, Err(DocumentError::Conflict(_))));

        let wrong = documents
            .unlink(
                doc.id,
                UnlinkRequest {
                    kind: Some(LinkKind::Activity),
                    id: Some(act2.id),
                },
                &fx.alice,
            )
            .await;
        assert!(matches!(wrong, Err(DocumentError::Conflict(_))));

        let unlinked = assert_ok!(documents.unlink(doc.id, UnlinkRequest::default(), &fx.alice).await);
        assert_eq!(unlinked.link, None);

        let relinked = assert_ok!(documents.link(doc.id, act2, &fx.alice).await);
        assert_eq!(relinked.link, Some(act2));
    }

    #[tokio::test]
    async fn concurrent_links_to_different_entities_keep_one() {
        let fx = Fixture::new().await;
        let racing = fx.interleaving_managers();
        let project = fx.entity(LinkKind::Project).await;
        let event = fx.entity(LinkKind::Event).await;
        let doc = fx.upload(&fx.alice, "Disputé", "application/pdf").await;

        let (first, second) = tokio::join!(
            racing.documents.link(doc.id, project, &fx.alice),
            racing.documents.link(doc.id, event, &fx.alice),
        );
        let winner = match (first, second) {
            (Ok(doc), Err(DocumentError::Conflict(_))) | (Err(DocumentError::Conflict(_)), Ok(doc)) => doc,
            other => panic!("expected exactly one link to win, got {other:?}"),
        };

        let stored = fx.store.find_document(doc.id).await.unwrap().unwrap();
        assert_eq!(stored.link, winner.link);
        assert!(stored.link == Some(project) || stored.link == Some(event));
    }

    #[tokio::test]
    async fn concurrent_link_and_metadata_update_both_persist() {
        let fx = Fixture::new().await;
        let racing = fx.interleaving_managers();
        let task = fx.entity(LinkKind::Task).await;
        let doc = fx.upload(&fx.alice, "Avant", "application/pdf").await;

        let (linked, renamed) = tokio::join!(
            racing.documents.link(doc.id, task, &fx.alice),
            racing.documents.update_metadata(
                doc.id,
                MetadataPatch {
                    title: Some("Après".into()),
                    ..Default::default()
                },
                &fx.alice,
            ),
        );
        assert_ok!(linked);
        assert_ok!(renamed);

        let stored = fx.store.find_document(doc.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Après");
        assert_eq!(stored.link, Some(task));
    }

    #[tokio::test]
    async fn concurrent_unlinks_both_succeed() {
        let fx = Fixture::new().await;
        let racing = fx.interleaving_managers();
        let training = fx.entity(LinkKind::Training).await;
        let doc = fx.upload(&fx.alice, "Formation", "application/pdf").await;
        assert_ok!(fx.managers.documents.link(doc.id, training, &fx.alice).await);

        let (first, second) = tokio::join!(
            racing.documents.unlink(doc.id, UnlinkRequest::default(), &fx.alice),
            racing.documents.unlink(doc.id, UnlinkRequest::default(), &fx.alice),
        );
        assert_eq!(assert_ok!(first).link, None);
        assert_eq!(assert_ok!(second).link, None);
    }

    #[tokio::test]
    async fn trashed_documents_cannot_be_linked_after_the_read() {
        let fx = Fixture::new().await;
        let racing = fx.interleaving_managers();
        let project = fx.entity(LinkKind::Project).await;
        let doc = fx.upload(&fx.alice, "Jeté", "application/pdf").await;

        let (linked, trashed) = tokio::join!(
            racing.documents.link(doc.id, project, &fx.alice),
            racing.documents.soft_delete(doc.id, &fx.alice),
        );
        assert_ok!(trashed);
        let stored = fx.store.find_document(doc.id).await.unwrap().unwrap();
        match linked {
            Ok(_) => assert_eq!(stored.link, Some(project)),
            Err(err) => {
                assert!(matches!(err, DocumentError::NotFound(_)));
                assert_eq!(stored.link, None);
            }
        }
    }

    #[tokio::test]
    async fn unlink_without_link_is_noop() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Seul", "application/pdf").await;
        let result = assert_ok!(
            fx.managers
                .documents
                .unlink(doc.id, UnlinkRequest::default(), &fx.alice)
                .await
        );
        assert_eq!(result.updated_at, doc.updated_at);
    }

    #[tokio::test]
    async fn soft_delete_is_idempotent_and_restore_round_trips() {
        let fx = Fixture::new().await;
        let documents = &fx.managers.documents;
        let doc = fx.upload(&fx.alice, "Thèse", "application/pdf").await;

        let first = assert_ok!(documents.soft_delete(doc.id, &fx.alice).await);
        let second = assert_ok!(documents.soft_delete(doc.id, &fx.alice).await);
        assert_eq!(first.deleted_at, second.deleted_at);
        assert_eq!(second.state(), DocumentState::Trashed);

        assert!(matches!(
            documents.get(doc.id, &fx.alice).await,
            Err(DocumentError::NotFound(_))
        ));

        let restored = assert_ok!(documents.restore(doc.id, &fx.alice).await);
        assert_eq!(restored, doc);
    }

    #[tokio::test]
    async fn restore_requires_trashed_document() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Actif", "application/pdf").await;
        let result = fx.managers.documents.restore(doc.id, &fx.alice).await;
        assert!(matches!(result, Err(DocumentError::Conflict(_))));
    }

    #[tokio::test]
    async fn strangers_cannot_delete() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Privé", "application/pdf").await;
        assert_err!(fx.managers.documents.soft_delete(doc.id, &fx.bob).await);
        assert_err!(fx.managers.documents.permanent_delete(doc.id, &fx.bob).await);
    }

    #[tokio::test]
    async fn permanent_delete_cascades() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Éphémère", "application/pdf").await;
        fx.share_with_bob(&doc, false, false).await;
        assert_ok!(fx.managers.favorites.add_favorite(doc.id, &fx.bob).await);

        assert_ok!(fx.managers.documents.permanent_delete(doc.id, &fx.alice).await);

        assert!(matches!(
            fx.managers.documents.get(doc.id, &fx.alice).await,
            Err(DocumentError::NotFound(_))
        ));
        let listed = assert_ok!(fx.managers.documents.list(&fx.alice, &DocumentQuery::default()).await);
        assert!(listed.items.is_empty());
        assert!(fx.store.shares_for_document(doc.id).await.unwrap().is_empty());
        assert_eq!(fx.store.favorite_count(doc.id).await, 0);
        assert!(!fx.files.contains(&doc.storage_path).await);
    }

    #[tokio::test]
    async fn permanent_delete_survives_missing_file() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Orphelin", "application/pdf").await;
        fx.files.delete(&doc.storage_path).await.unwrap();

        assert_ok!(fx.managers.documents.permanent_delete(doc.id, &fx.alice).await);
        assert!(fx.store.find_document(doc.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_after_purge_is_not_found() {
        let fx = Fixture::new().await;
        let doc = fx.upload(&fx.alice, "Disparu", "application/pdf").await;
        assert_ok!(fx.managers.documents.soft_delete(doc.id, &fx.alice).await);
        assert_ok!(fx.managers.documents.permanent_delete(doc.id, &fx.alice).await);

        let result = fx.managers.documents.restore(doc.id, &fx.alice).await;
        assert!(matches!(result, Err(DocumentError::NotFound(_))));
    }

    #[tokio::test]
    async fn empty_trash_only_purges_expired_trash() {
        let fx = Fixture::new().await;
        let documents = &fx.managers.documents;
        let old = fx.upload(&fx.alice, "Ancien", "application/pdf").await;
        let fresh = fx.upload(&fx.alice, "Récent", "application/pdf").await;
        let active = fx.upload(&fx.alice, "Actif", "application/pdf").await;

        assert_ok!(documents.soft_delete(old.id, &fx.alice).await);
        fx.clock.advance(Duration::days(31));
        assert_ok!(documents.soft_delete(fresh.id, &fx.alice).await);
        fx.clock.advance(Duration::days(1));

        assert_eq!(assert_ok!(documents.empty_trash(&fx.alice).await), 1);
        assert!(fx.store.find_document(old.id).await.unwrap().is_none());
        assert!(fx.store.find_document(fresh.id).await.unwrap().is_some());
        assert!(fx.store.find_document(active.id).await.unwrap().is_some());

        // Nothing left that qualifies.
        assert_eq!(assert_ok!(documents.empty_trash(&fx.alice).await), 0);
    }

    #[tokio::test]
    async fn empty_trash_is_scoped_to_owner_unless_admin() {
        let fx = Fixture::new().await;
        let documents = &fx.managers.documents;
        let alices = fx.upload(&fx.alice, "A", "application/pdf").await;
        let bobs = fx.upload(&fx.bob, "B", "application/pdf").await;
        assert_ok!(documents.soft_delete(alices.id, &fx.alice).await);
        assert_ok!(documents.soft_delete(bobs.id, &fx.bob).await);
        fx.clock.advance(Duration::days(40));

        assert_eq!(assert_ok!(documents.empty_trash(&fx.alice).await), 1);
        assert!(fx.store.find_document(bobs.id).await.unwrap().is_some());

        assert_eq!(assert_ok!(documents.empty_trash(&fx.admin).await), 1);
        assert!(fx.store.find_document(bobs.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_uses_configured_retention() {
        let fx = Fixture::with_retention(Duration::days(7)).await;
        let documents = &fx.managers.documents;
        let doc = fx.upload(&fx.alice, "Court terme", "application/pdf").await;
        assert_ok!(documents.soft_delete(doc.id, &fx.alice).await);

        fx.clock.advance(Duration::days(6));
        assert_eq!(assert_ok!(documents.sweep_trash().await), 0);
        fx.clock.advance(Duration::days(2));
        assert_eq!(assert_ok!(documents.sweep_trash().await), 1);
    }

    #[tokio::test]
    async fn trash_at_exactly_the_retention_age_is_purged() {
        let fx = Fixture::new().await;
        let documents = &fx.managers.documents;
        let doc = fx.upload(&fx.alice, "Limite", "application/pdf").await;
        let trashed = assert_ok!(documents.soft_delete(doc.id, &fx.alice).await);
        let deleted_at = trashed.deleted_at.unwrap();

        fx.clock.set(deleted_at + fx.settings().trash_retention - Duration::seconds(1));
        let listed = assert_ok!(documents.list_trash(&fx.alice, &DocumentQuery::default()).await);
        assert_eq!(listed.pagination.total, 1);
        assert_eq!(assert_ok!(documents.sweep_trash().await), 0);

        fx.clock.set(deleted_at + fx.settings().trash_retention);
        let listed = assert_ok!(documents.list_trash(&fx.alice, &DocumentQuery::default()).await);
        assert_eq!(listed.pagination.total, 0);
        assert_eq!(assert_ok!(documents.empty_trash(&fx.alice).await), 1);
        assert!(fx.store.find_document(doc.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_respects_visibility() {
        let fx = Fixture::new().await;
        let documents = &fx.managers.documents;
        let private = fx.upload(&fx.alice, "Privé", "application/pdf").await;
        let public = fx.upload(&fx.alice, "Public", "application/pdf").await;
        assert_ok!(
            documents
                .update_metadata(
                    public.id,
                    MetadataPatch {
                        is_public: Some(true),
                        ..Default::default()
                    },
                    &fx.alice,
                )
                .await
        );

        let bobs_view = assert_ok!(documents.list(&fx.bob, &DocumentQuery::default()).await);
        assert_eq!(bobs_view.pagination.total, 1);
        assert_eq!(bobs_view.items[0].id, public.id);

        fx.share_with_bob(&private, false, false).await;
        let shared = assert_ok!(
            documents
                .list(
                    &fx.bob,
                    &DocumentQuery {
                        shared_with_me: Some(true),
                        ..Default::default()
                    },
                )
                .await
        );
        assert_eq!(shared.pagination.total, 1);
        assert_eq!(shared.items[0].id, private.id);

        let admin_view = assert_ok!(documents.list(&fx.admin, &DocumentQuery::default()).await);
        assert_eq!(admin_view.pagination.total, 2);
    }

    #[tokio::test]
    async fn list_filters_sorts_and_paginates() {
        let fx = Fixture::new().await;
        let documents = &fx.managers.documents;
        for title in ["Gamma", "Alpha", "Beta"] {
            fx.upload(&fx.alice, title, "application/pdf").await;
        }
        fx.upload(&fx.alice, "Photo", "image/jpeg").await;

        let page = assert_ok!(
            documents
                .list(
                    &fx.alice,
                    &DocumentQuery {
                        doc_type: Some(DocumentType::Other),
                        sort_by: Some(SortField::Title),
                        order: Some(SortOrder::Asc),
                        limit: Some(2),
                        ..Default::default()
                    },
                )
                .await
        );
        let titles: Vec<_> = page.items.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.total_pages, 2);
        assert!(page.pagination.has_next);
        assert!(!page.pagination.has_prev);

        let search = assert_ok!(
            documents
                .list(
                    &fx.alice,
                    &DocumentQuery {
                        search: Some("alp".into()),
                        ..Default::default()
                    },
                )
                .await
        );
        assert_eq!(search.pagination.total, 1);
    }

    #[tokio::test]
    async fn trash_listing_honours_retention_window() {
        let fx = Fixture::new().await;
        let documents = &fx.managers.documents;
        let doc = fx.upload(&fx.alice, "Corbeille", "application/pdf").await;
        assert_ok!(documents.soft_delete(doc.id, &fx.alice).await);

        let trash = assert_ok!(documents.list_trash(&fx.alice, &DocumentQuery::default()).await);
        assert_eq!(trash.pagination.total, 1);

        let bobs = assert_ok!(documents.list_trash(&fx.bob, &DocumentQuery::default()).await);
        assert_eq!(bobs.pagination.total, 0);

        fx.clock.advance(Duration::days(31));
        let expired = assert_ok!(documents.list_trash(&fx.alice, &DocumentQuery::default()).await);
        assert_eq!(expired.pagination.total, 0);
    }
}
