use std::sync::Arc;

use cra_core::clock::Clock;
use cra_core::events::bus::EventBus;
use cra_core::manager::{
    DocumentManager, FavoriteManager, ManagerContext, Managers, ShareManager,
};
use cra_core::storage::FileStorage;
use cra_core::store::DocumentStore;

use crate::auth::TokenKeys;
use crate::config::AppConfig;

/// Shared application state, passed to all handlers via Axum's `State` extractor.
/// Wrapped in `Arc` so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    store: Arc<dyn DocumentStore>,
    files: Arc<dyn FileStorage>,
    managers: Managers,
    config: AppConfig,
    token_keys: TokenKeys,
    event_bus: EventBus,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        files: Arc<dyn FileStorage>,
        clock: Arc<dyn Clock>,
        config: AppConfig,
        event_bus: EventBus,
    ) -> Self {
        let context = ManagerContext::new(
            store.clone(),
            files.clone(),
            clock,
            event_bus.clone(),
            config.document_settings(),
        );
        Self {
            inner: Arc::new(InnerState {
                store,
                files,
                managers: Managers::new(context),
                token_keys: TokenKeys::new(&config.jwt_secret),
                config,
                event_bus,
            }),
        }
    }

    pub fn documents(&self) -> &DocumentManager {
        &self.inner.managers.documents
    }

    pub fn shares(&self) -> &ShareManager {
        &self.inner.managers.shares
    }

    pub fn favorites(&self) -> &FavoriteManager {
        &self.inner.managers.favorites
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    pub fn files(&self) -> &Arc<dyn FileStorage> {
        &self.inner.files
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn token_keys(&self) -> &TokenKeys {
        &self.inner.token_keys
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }
}
