pub mod link;
pub mod model;
pub mod patch;
pub mod share;
pub mod validate;

pub use link::{LinkKind, LinkTarget};
pub use model::{Document, DocumentRow, DocumentState, DocumentType};
pub use patch::{FileMeta, MetadataPatch, NewDocument, PermissionPatch, ShareOptions, UnlinkRequest};
pub use share::{DocumentFavorite, DocumentShare};
