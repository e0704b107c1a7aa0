// Public liveness endpoint; nothing here requires a token.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{ComponentHealth, HealthResponse, HealthStatus};
pub use router::health_routes;
pub use services::HealthMonitorService;
