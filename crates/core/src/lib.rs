//! Document lifecycle and access-control engine for the CRA platform.
//!
//! The managers in [`manager`] are the entry points. They are constructed with
//! a [`store::DocumentStore`], a [`storage::FileStorage`], a [`clock::Clock`]
//! and an [`events::bus::EventBus`], so the HTTP layer and tests can plug in
//! whichever adapters they need.

pub mod access;
pub mod clock;
pub mod document;
pub mod error;
pub mod events;
pub mod identity;
pub mod manager;
pub mod query;
pub mod storage;
pub mod store;

pub use document::validate::ValidationError;
pub use error::{DocumentError, DocumentResult};
pub use identity::{Requester, Role};
