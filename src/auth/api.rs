//! Authentication API Endpoints
//! Mission: Exchange credentials for a token, and expose who the caller is

use crate::auth::{
    authenticator::Authenticator,
    error::AuthError,
    jwt::JwtHandler,
    middleware::extract_identity,
    models::{AuthenticatedIdentity, LoginRequest, LoginResponse},
};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<Authenticator>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(authenticator: Arc<Authenticator>, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            authenticator,
            jwt_handler,
        }
    }
}

/// Login endpoint - POST /login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let identity = match state
        .authenticator
        .authenticate(&payload.login, &payload.password)
        .await
    {
        Ok(identity) => identity,
        Err(e) if e.is_unauthorized() => {
            warn!("Failed login attempt");
            return Err(e);
        }
        Err(e) => {
            error!("Login could not be processed: {}", e);
            return Err(e);
        }
    };

    let (token, _claims) = state.jwt_handler.issue(&identity).map_err(|e| {
        error!("Token issuance failed: {}", e);
        e
    })?;

    info!("Login successful: {}", identity.login);

    Ok(Json(LoginResponse { token }))
}

/// Get current identity - GET /me
/// Built from the verified token alone (no store lookup)
pub async fn get_current_user(req: Request) -> Result<Json<AuthenticatedIdentity>, AuthError> {
    let identity = extract_identity(&req).ok_or(AuthError::MissingCredential)?;
    Ok(Json(identity.clone()))
}

/// Generic error surface - GET /error
pub async fn error_page() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "The request could not be processed" })),
    )
}

/// Health check - GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
