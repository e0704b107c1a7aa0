use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use appointment_cell::router::appointment_routes;
use auth_cell::router::{auth_routes, user_routes};
use catalog_cell::router::catalog_routes;
use insights_cell::router::{dashboard_routes, gamification_routes, timeline_routes};
use monitoring_cell::router::health_routes;
use patient_cell::router::create_patient_router;
use payment_cell::router::payment_routes;
use recovery_cell::router::{patient_photo_routes, photo_analysis_routes};
use shared_database::AppState;
use shared_utils::basic_auth::basic_auth_gate;

pub fn create_router(state: Arc<AppState>) -> Router {
    let patients = create_patient_router(state.clone()).merge(patient_photo_routes(state.clone()));

    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .merge(health_routes(state.clone()))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/users", user_routes(state.clone()))
        .nest("/patients", patients)
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/photo-analyses", photo_analysis_routes(state.clone()))
        .nest("/payments", payment_routes(state.clone()))
        .nest("/catalog", catalog_routes(state.clone()))
        .nest("/timeline", timeline_routes(state.clone()))
        .nest("/dashboard", dashboard_routes(state.clone()))
        .nest("/gamification", gamification_routes(state.clone()))
        // No-op unless BASIC_AUTH_USER and BASIC_AUTH_PASSWORD are set.
        .layer(middleware::from_fn_with_state(state, basic_auth_gate))
}
