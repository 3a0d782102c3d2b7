//! PostgreSQL adapter for [`DocumentStore`].
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Counter, DocumentFilter, DocumentStore, Lifecycle, MetadataUpdate, Scope, ShareGrant};
use crate::document::{
    Document, DocumentFavorite, DocumentRow, DocumentShare, LinkKind, LinkTarget,
};
use crate::error::{DocumentError, DocumentResult};
use crate::query::{Page, PageRequest};

const DOCUMENT_COLUMNS: &str = "id, title, description, doc_type, storage_path, \
    original_filename, size_bytes, mime_type, tags, is_public, owner_id, \
    project_id, activity_id, task_id, seminar_id, training_id, internship_id, \
    supervision_id, knowledge_transfer_id, event_id, \
    view_count, download_count, deleted_at, created_at, updated_at";

const LINK_COLUMNS: &str = "project_id, activity_id, task_id, seminar_id, training_id, \
    internship_id, supervision_id, knowledge_transfer_id, event_id";

const SHARE_COLUMNS: &str = "id, document_id, shared_with_id, can_edit, can_delete, \
    shared_at, expires_at, revoked_at, revoked_by";

/// Map a unique-constraint violation to a conflict, everything else to a database error.
fn map_write_err(err: sqlx::Error, what: &str) -> DocumentError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DocumentError::Conflict(format!("{what} already exists"))
        }
        _ => DocumentError::Database(err),
    }
}

fn into_document(row: Option<DocumentRow>) -> DocumentResult<Option<Document>> {
    row.map(Document::try_from).transpose()
}

/// Escape `%`, `_` and `\` so a search term matches literally inside `ILIKE`.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `UPDATE` writing only the provided metadata columns of an active document.
fn metadata_update_query(
    id: Uuid,
    update: &MetadataUpdate,
    at: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE documents SET updated_at = ");
    qb.push_bind(at);
    if let Some(title) = &update.title {
        qb.push(", title = ");
        qb.push_bind(title.clone());
    }
    if let Some(description) = &update.description {
        qb.push(", description = ");
        qb.push_bind(description.clone());
    }
    if let Some(doc_type) = update.doc_type {
        qb.push(", doc_type = ");
        qb.push_bind(doc_type);
    }
    if let Some(tags) = &update.tags {
        qb.push(", tags = ");
        qb.push_bind(tags.clone());
    }
    if let Some(is_public) = update.is_public {
        qb.push(", is_public = ");
        qb.push_bind(is_public);
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);
    qb.push(format_args!(
        " AND deleted_at IS NULL RETURNING {DOCUMENT_COLUMNS}"
    ));
    qb
}

/// `EXISTS (...)` clause for an active share held by `user`.
fn push_active_share(
    qb: &mut QueryBuilder<'_, Postgres>,
    user: Uuid,
    now: DateTime<Utc>,
    require_delete: bool,
) {
    qb.push(
        "EXISTS (SELECT 1 FROM document_shares s WHERE s.document_id = d.id AND s.shared_with_id = ",
    );
    qb.push_bind(user);
    qb.push(" AND s.revoked_at IS NULL AND (s.expires_at IS NULL OR s.expires_at > ");
    qb.push_bind(now);
    qb.push(")");
    if require_delete {
        qb.push(" AND s.can_delete");
    }
    qb.push(")");
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &DocumentFilter) {
    match filter.lifecycle {
        Lifecycle::Active => {
            qb.push(" WHERE d.deleted_at IS NULL");
        }
        Lifecycle::TrashedSince(since) => {
            qb.push(" WHERE d.deleted_at IS NOT NULL AND d.deleted_at > ");
            qb.push_bind(since);
        }
    }

    match filter.scope {
        Scope::All => {}
        Scope::ViewableBy(user) => {
            qb.push(" AND (d.is_public OR d.owner_id = ");
            qb.push_bind(user);
            qb.push(" OR ");
            push_active_share(qb, user, filter.now, false);
            qb.push(")");
        }
        Scope::DeletableBy(user) => {
            qb.push(" AND (d.owner_id = ");
            qb.push_bind(user);
            qb.push(" OR ");
            push_active_share(qb, user, filter.now, true);
            qb.push(")");
        }
    }

    if let Some(user) = filter.shared_with {
        qb.push(" AND ");
        push_active_share(qb, user, filter.now, false);
    }
    if let Some(user) = filter.favorited_by {
        qb.push(
            " AND EXISTS (SELECT 1 FROM document_favorites f WHERE f.document_id = d.id AND f.user_id = ",
        );
        qb.push_bind(user);
        qb.push(")");
    }
    if let Some(doc_type) = filter.doc_type {
        qb.push(" AND d.doc_type = ");
        qb.push_bind(doc_type);
    }
    if let Some(owner) = filter.owner_id {
        qb.push(" AND d.owner_id = ");
        qb.push_bind(owner);
    }
    match (filter.link_kind, filter.linked_id) {
        (_, None) => {}
        (Some(kind), Some(id)) => {
            qb.push(format_args!(" AND d.{} = ", kind.column()));
            qb.push_bind(id);
        }
        (None, Some(id)) => {
            qb.push(" AND ");
            qb.push_bind(id);
            qb.push(" IN (");
            {
                let mut columns = qb.separated(", ");
                for kind in LinkKind::ALL {
                    columns.push(format_args!("d.{}", kind.column()));
                }
            }
            qb.push(")");
        }
    }
    if !filter.tags.is_empty() {
        qb.push(" AND d.tags && ");
        qb.push_bind(filter.tags.clone());
    }
    if let Some(mime) = &filter.mime_type {
        qb.push(" AND d.mime_type = ");
        qb.push_bind(mime.clone());
    }
    if let Some(is_public) = filter.is_public {
        qb.push(" AND d.is_public = ");
        qb.push_bind(is_public);
    }
    if let Some(term) = &filter.search {
        qb.push(" AND d.title ILIKE ");
        qb.push_bind(like_pattern(term));
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn ping(&self) -> DocumentResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, doc), fields(document_id = %doc.id))]
    async fn insert_document(&self, doc: &Document) -> DocumentResult<()> {
        let [project, activity, task, seminar, training, internship, supervision, knowledge_transfer, event] =
            LinkTarget::to_columns(doc.link.as_ref());

        sqlx::query(
            r#"
            INSERT INTO documents (
                id, title, description, doc_type, storage_path, original_filename,
                size_bytes, mime_type, tags, is_public, owner_id,
                project_id, activity_id, task_id, seminar_id, training_id,
                internship_id, supervision_id, knowledge_transfer_id, event_id,
                view_count, download_count, deleted_at, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20,
                $21, $22, $23, $24, $25
            )
            "#,
        )
        .bind(doc.id)
        .bind(&doc.title)
        .bind(&doc.description)
        .bind(doc.doc_type)
        .bind(&doc.storage_path)
        .bind(&doc.original_filename)
        .bind(doc.size_bytes)
        .bind(&doc.mime_type)
        .bind(&doc.tags)
        .bind(doc.is_public)
        .bind(doc.owner_id)
        .bind(project)
        .bind(activity)
        .bind(task)
        .bind(seminar)
        .bind(training)
        .bind(internship)
        .bind(supervision)
        .bind(knowledge_transfer)
        .bind(event)
        .bind(doc.view_count)
        .bind(doc.download_count)
        .bind(doc.deleted_at)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_err(e, "document"))?;

        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> DocumentResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        into_document(row)
    }

    #[tracing::instrument(skip(self, update))]
    async fn update_metadata(
        &self,
        id: Uuid,
        update: &MetadataUpdate,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>> {
        let mut qb = metadata_update_query(id, update, at);
        let row: Option<DocumentRow> = qb.build_query_as().fetch_optional(&self.pool).await?;

        into_document(row)
    }

    #[tracing::instrument(skip(self))]
    async fn set_link(
        &self,
        id: Uuid,
        target: &LinkTarget,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE documents SET {column} = $2, updated_at = $3 \
             WHERE id = $1 AND deleted_at IS NULL AND num_nonnulls({LINK_COLUMNS}) = 0 \
             RETURNING {DOCUMENT_COLUMNS}",
            column = target.kind.column(),
        ))
        .bind(id)
        .bind(target.id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        into_document(row)
    }

    #[tracing::instrument(skip(self))]
    async fn clear_link(
        &self,
        id: Uuid,
        current: &LinkTarget,
        at: DateTime<Utc>,
    ) -> DocumentResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE documents SET {column} = NULL, updated_at = $3 \
             WHERE id = $1 AND deleted_at IS NULL AND {column} = $2 \
             RETURNING {DOCUMENT_COLUMNS}",
            column = current.kind.column(),
        ))
        .bind(id)
        .bind(current.id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        into_document(row)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_trashed(&self, id: Uuid, at: DateTime<Utc>) -> DocumentResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE documents SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        into_document(row)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_restored(&self, id: Uuid) -> DocumentResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE documents SET deleted_at = NULL WHERE id = $1 AND deleted_at IS NOT NULL \
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        into_document(row)
    }

    #[tracing::instrument(skip(self))]
    async fn purge_document(&self, id: Uuid) -> DocumentResult<Option<Document>> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query("DELETE FROM document_favorites WHERE document_id = $1")
            .bind(id)
            .execute(&mut *transaction)
            .await?;

        sqlx::query("DELETE FROM document_shares WHERE document_id = $1")
            .bind(id)
            .execute(&mut *transaction)
            .await?;

        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "DELETE FROM documents WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *transaction)
        .await?;

        if let Err(e) = transaction.commit().await {
            tracing::error!(error=?e, "unable to commit purge transaction");
            return Err(e.into());
        }

        into_document(row)
    }

    async fn trashed_before(
        &self,
        owner_id: Option<Uuid>,
        cutoff: DateTime<Utc>,
    ) -> DocumentResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM documents
            WHERE deleted_at IS NOT NULL
              AND deleted_at <= $1
              AND ($2::uuid IS NULL OR owner_id = $2)
            ORDER BY deleted_at
            "#,
        )
        .bind(cutoff)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn increment_counter(&self, id: Uuid, counter: Counter) -> DocumentResult<()> {
        let column = counter.column();
        sqlx::query(&format!(
            "UPDATE documents SET {column} = {column} + 1 WHERE id = $1"
        ))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, filter))]
    async fn list_documents(
        &self,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> DocumentResult<Page<Document>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents d");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d"
        ));
        push_filters(&mut select, filter);
        let direction = filter.order.keyword();
        select.push(format_args!(
            " ORDER BY d.{} {direction}, d.id {direction} LIMIT ",
            filter.sort.column()
        ));
        select.push_bind(i64::from(page.limit));
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let rows: Vec<DocumentRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(Document::try_from)
            .collect::<DocumentResult<Vec<_>>>()?;

        Ok(Page::new(items, page, u64::try_from(total).unwrap_or_default()))
    }

    async fn entity_exists(&self, link: &LinkTarget) -> DocumentResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            link.kind.table()
        ))
        .bind(link.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn user_exists(&self, user_id: Uuid) -> DocumentResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self, grants), fields(grants = grants.len()))]
    async fn grant_shares(&self, grants: &[ShareGrant]) -> DocumentResult<Vec<DocumentShare>> {
        let mut transaction = self.pool.begin().await?;
        let mut granted = Vec::with_capacity(grants.len());

        for grant in grants {
            if let Some(retired) = &grant.retire {
                sqlx::query(
                    "UPDATE document_shares SET revoked_at = $2, revoked_by = $3 \
                     WHERE id = $1 AND revoked_at IS NULL",
                )
                .bind(retired.id)
                .bind(retired.revoked_at)
                .bind(retired.revoked_by)
                .execute(&mut *transaction)
                .await?;
            }

            let share = &grant.share;
            let stored = sqlx::query_as::<_, DocumentShare>(&format!(
                r#"
                INSERT INTO document_shares (
                    id, document_id, shared_with_id, can_edit, can_delete,
                    shared_at, expires_at, revoked_at, revoked_by
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, NULL)
                ON CONFLICT (document_id, shared_with_id) WHERE revoked_at IS NULL
                DO UPDATE SET can_edit = EXCLUDED.can_edit,
                              can_delete = EXCLUDED.can_delete,
                              expires_at = EXCLUDED.expires_at
                RETURNING {SHARE_COLUMNS}
                "#
            ))
            .bind(share.id)
            .bind(share.document_id)
            .bind(share.shared_with_id)
            .bind(share.can_edit)
            .bind(share.can_delete)
            .bind(share.shared_at)
            .bind(share.expires_at)
            .fetch_one(&mut *transaction)
            .await?;
            granted.push(stored);
        }

        if let Err(e) = transaction.commit().await {
            tracing::error!(error=?e, "unable to commit share transaction");
            return Err(e.into());
        }
        Ok(granted)
    }

    #[tracing::instrument(skip(self, share), fields(share_id = %share.id))]
    async fn update_share(&self, share: &DocumentShare) -> DocumentResult<Option<DocumentShare>> {
        let updated = sqlx::query_as::<_, DocumentShare>(&format!(
            r#"
            UPDATE document_shares
            SET can_edit = $2, can_delete = $3, expires_at = $4, revoked_at = $5, revoked_by = $6
            WHERE id = $1 AND revoked_at IS NULL
            RETURNING {SHARE_COLUMNS}
            "#
        ))
        .bind(share.id)
        .bind(share.can_edit)
        .bind(share.can_delete)
        .bind(share.expires_at)
        .bind(share.revoked_at)
        .bind(share.revoked_by)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn find_share(&self, id: Uuid) -> DocumentResult<Option<DocumentShare>> {
        let share = sqlx::query_as::<_, DocumentShare>(&format!(
            "SELECT {SHARE_COLUMNS} FROM document_shares WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(share)
    }

    async fn shares_for_document(&self, document_id: Uuid) -> DocumentResult<Vec<DocumentShare>> {
        let shares = sqlx::query_as::<_, DocumentShare>(&format!(
            "SELECT {SHARE_COLUMNS} FROM document_shares WHERE document_id = $1 \
             ORDER BY shared_at, id"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(shares)
    }

    async fn insert_favorite(&self, favorite: &DocumentFavorite) -> DocumentResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO document_favorites (id, document_id, user_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (document_id, user_id) DO NOTHING
            "#,
        )
        .bind(favorite.id)
        .bind(favorite.document_id)
        .bind(favorite.user_id)
        .bind(favorite.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_favorite(&self, document_id: Uuid, user_id: Uuid) -> DocumentResult<bool> {
        let result =
            sqlx::query("DELETE FROM document_favorites WHERE document_id = $1 AND user_id = $2")
                .bind(document_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Lifecycle, Scope};

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_done"), "%50\\%\\_done%");
    }

    #[test]
    fn filters_render_scope_and_link_clauses() {
        let user = Uuid::new_v4();
        let mut filter = DocumentFilter::new(Scope::ViewableBy(user), Lifecycle::Active, Utc::now());
        filter.linked_id = Some(Uuid::new_v4());
        filter.tags = vec!["ml".into()];

        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents d");
        push_filters(&mut qb, &filter);
        let sql = qb.sql();

        assert!(sql.contains("d.deleted_at IS NULL"));
        assert!(sql.contains("d.is_public OR d.owner_id = $1"));
        assert!(sql.contains("s.revoked_at IS NULL"));
        assert!(sql.contains("IN (d.project_id, d.activity_id"));
        assert!(sql.contains("d.tags && "));
    }

    #[test]
    fn deletable_scope_requires_delete_flag() {
        let since = Utc::now();
        let filter = DocumentFilter::new(
            Scope::DeletableBy(Uuid::new_v4()),
            Lifecycle::TrashedSince(since),
            since,
        );
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents d");
        push_filters(&mut qb, &filter);
        let sql = qb.sql();

        assert!(sql.contains("d.deleted_at IS NOT NULL AND d.deleted_at > $1"));
        assert!(sql.contains("s.can_delete"));
        assert!(!sql.contains("d.is_public"));
    }

    #[test]
    fn metadata_update_writes_only_given_columns() {
        let update = MetadataUpdate {
            title: Some("Rapport".into()),
            description: Some(None),
            ..Default::default()
        };
        let qb = metadata_update_query(Uuid::new_v4(), &update, Utc::now());
        let sql = qb.sql();

        assert!(sql.starts_with("UPDATE documents SET updated_at = $1, title = $2, description = $3 WHERE id = $4"));
        assert!(sql.contains("AND deleted_at IS NULL RETURNING"));
        for untouched in ["tags =", "doc_type =", "is_public =", "project_id ="] {
            assert!(!sql.contains(untouched), "{untouched} must not be written");
        }
    }
}
