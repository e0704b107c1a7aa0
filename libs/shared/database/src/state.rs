use std::sync::Arc;

use shared_config::AppConfig;

use crate::pool::DbPool;

/// Shared router state: immutable configuration plus the connection pool.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Arc<Self> {
        Arc::new(Self { config, db })
    }
}
