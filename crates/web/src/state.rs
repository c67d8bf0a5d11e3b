//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::WebConfig;
use crate::db::DocumentStore;
use crate::flash::FlashStore;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: WebConfig,
    store: DocumentStore,
    flash: FlashStore,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: WebConfig, store: DocumentStore) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                flash: FlashStore::new(),
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &WebConfig {
        &self.inner.config
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.inner.store
    }

    /// Get a reference to the flash mailbox.
    #[must_use]
    pub fn flash(&self) -> &FlashStore {
        &self.inner.flash
    }
}
