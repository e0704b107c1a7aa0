use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Read-only catalog; any authenticated caller may read it.
pub fn catalog_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/procedures", get(handlers::list_procedures))
        .route("/procedures/{name}", get(handlers::get_procedure))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
