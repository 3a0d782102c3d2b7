//! Access policy: the yes/no decisions "can this user do X to this document".
//!
//! Every function is pure over `(requester, document, shares, now)`. Callers
//! must load the shares fresh for each request, since a share can be revoked
//! or expire between two calls.

use chrono::{DateTime, Utc};

use crate::document::{Document, DocumentShare};
use crate::identity::Requester;

fn is_owner(requester: &Requester, doc: &Document) -> bool {
    requester.user_id == doc.owner_id
}

/// The requester's active shares on `doc`.
fn active_shares<'a>(
    requester: &'a Requester,
    doc: &'a Document,
    shares: &'a [DocumentShare],
    now: DateTime<Utc>,
) -> impl Iterator<Item = &'a DocumentShare> + 'a {
    shares.iter().filter(move |share| {
        share.document_id == doc.id
            && share.shared_with_id == requester.user_id
            && share.is_active(now)
    })
}

pub fn can_view(
    requester: &Requester,
    doc: &Document,
    shares: &[DocumentShare],
    now: DateTime<Utc>,
) -> bool {
    doc.is_public
        || requester.is_admin()
        || is_owner(requester, doc)
        || active_shares(requester, doc, shares, now).next().is_some()
}

pub fn can_edit(
    requester: &Requester,
    doc: &Document,
    shares: &[DocumentShare],
    now: DateTime<Utc>,
) -> bool {
    requester.is_admin()
        || is_owner(requester, doc)
        || active_shares(requester, doc, shares, now).any(|share| share.can_edit)
}

pub fn can_delete(
    requester: &Requester,
    doc: &Document,
    shares: &[DocumentShare],
    now: DateTime<Utc>,
) -> bool {
    requester.is_admin()
        || is_owner(requester, doc)
        || active_shares(requester, doc, shares, now).any(|share| share.can_delete)
}

/// Editors cannot re-share: only the owner and admins can.
pub fn can_share(requester: &Requester, doc: &Document) -> bool {
    requester.is_admin() || is_owner(requester, doc)
}

/// Capabilities of one requester on one document, computed once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub view: bool,
    pub edit: bool,
    pub delete: bool,
    pub share: bool,
}

impl Access {
    pub fn evaluate(
        requester: &Requester,
        doc: &Document,
        shares: &[DocumentShare],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            view: can_view(requester, doc, shares, now),
            edit: can_edit(requester, doc, shares, now),
            delete: can_delete(requester, doc, shares, now),
            share: can_share(requester, doc),
        }
    }
}
