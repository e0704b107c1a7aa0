use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn payment_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_payments).post(handlers::create_payment))
        .route(
            "/{id}",
            get(handlers::get_payment)
                .patch(handlers::update_payment)
                .delete(handlers::delete_payment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
