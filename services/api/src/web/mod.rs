pub mod auth;
pub mod generate;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use state::AppState;

/// Builds the API router. Shared by the server binary and the integration
/// tests, which drive it directly with an in-memory store.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    // Public routes: registration, login, the poller's read path, and the
    // scraper collaborator's callback.
    let public_routes = Router::new()
        .route("/", get(rest::health_handler))
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/scrape", post(rest::scrape_callback_handler))
        .route("/prompt/{id}", get(rest::get_dataset_handler));

    // Protected routes require a bearer token.
    let protected_routes = Router::new()
        .route("/prompt", post(rest::submit_prompt_handler))
        .route("/dashboard", get(rest::dashboard_handler))
        .route("/dataset/{promptId}", delete(rest::delete_dataset_handler))
        .route(
            "/user/apikey",
            get(rest::get_api_key_handler).post(rest::set_api_key_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
