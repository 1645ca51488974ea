//! HTTP router assembly
//!
//! Every route sits behind the request gate; the allow-list decides which
//! ones answer without a token.

use crate::{
    auth::{api as auth_api, auth_middleware, AuthState, RequestGate},
    middleware::request_logging,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn build_router(auth_state: AuthState, gate: Arc<RequestGate>) -> Router {
    Router::new()
        .route("/login", post(auth_api::login))
        .route("/error", get(auth_api::error_page))
        .route("/health", get(auth_api::health_check))
        .route("/me", get(auth_api::get_current_user))
        .with_state(auth_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging))
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(gate, auth_middleware)),
        )
}
