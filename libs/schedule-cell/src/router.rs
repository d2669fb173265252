// libs/schedule-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    // Every schedule operation requires an authenticated caller
    let protected_routes = Router::new()
        .route("/schedule", post(handlers::create_shift))
        .route("/schedule/doctors/{doctor_id}", get(handlers::get_doctor_shifts))
        .route("/doctors/{doctor_id}/available-dates", get(handlers::get_available_dates))
        .route("/availability", get(handlers::check_availability))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
