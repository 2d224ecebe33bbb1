//! Application state shared by the admin handlers

use std::sync::Arc;

use crate::infrastructure::cache::CacheStore;
use crate::infrastructure::services::CacheManager;

/// Handles to the cache layer; cheap to clone
#[derive(Debug, Clone)]
pub struct AppState {
    pub manager: Arc<CacheManager>,
}

impl AppState {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self { manager }
    }

    pub fn store(&self) -> &CacheStore {
        self.manager.store()
    }
}
