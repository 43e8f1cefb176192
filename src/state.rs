use crate::cache::CacheWorker;
use crate::storage::StorageProvider;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageProvider>,
    pub cache: Option<Arc<CacheWorker>>,
}

impl AppState {
    pub fn new(storage: Arc<dyn StorageProvider>, cache: Option<Arc<CacheWorker>>) -> Self {
        Self { storage, cache }
    }
}
