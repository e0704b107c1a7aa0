use std::time::Instant;

use tracing::{debug, error, instrument};

use shared_config::AppConfig;
use shared_database::{ping, DbPool};

use crate::models::{ComponentHealth, HealthResponse, HealthStatus};

pub struct HealthMonitorService {
    pool: DbPool,
    environment: String,
}

impl HealthMonitorService {
    pub fn new(config: &AppConfig, pool: &DbPool) -> Self {
        Self {
            pool: pool.clone(),
            environment: config.environment.clone(),
        }
    }

    /// Overall status follows the database: the API is useless without it.
    #[instrument(skip(self))]
    pub async fn check(&self) -> HealthResponse {
        let database = self.check_database_health().await;

        HealthResponse {
            status: database.status,
            environment: self.environment.clone(),
            database,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    async fn check_database_health(&self) -> ComponentHealth {
        let start = Instant::now();

        match ping(&self.pool).await {
            Ok(()) => {
                debug!("Database ping succeeded");
                ComponentHealth {
                    status: HealthStatus::Ok,
                    response_time_ms: start.elapsed().as_millis() as u64,
                    error_message: None,
                }
            }
            Err(e) => {
                error!("Database health check failed: {}", e);
                ComponentHealth {
                    status: HealthStatus::Error,
                    response_time_ms: start.elapsed().as_millis() as u64,
                    error_message: Some(e.to_string()),
                }
            }
        }
    }
}
