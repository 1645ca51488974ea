//! Authentication Middleware
//! Mission: Put the request gate in front of every route

use crate::auth::{
    error::AuthError,
    gate::{GateDecision, RequestGate},
    models::AuthenticatedIdentity,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Auth middleware: admits allow-listed paths and valid bearer tokens,
/// rejects everything else with a uniform 401.
pub async fn auth_middleware(
    State(gate): State<Arc<RequestGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let path = req.uri().path().to_string();

    let decision = gate.authorize(&path, req.headers()).await;

    match decision {
        GateDecision::Admitted(Some(identity)) => {
            // Handlers read the identity back out of the extensions
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        GateDecision::Admitted(None) => Ok(next.run(req).await),
        GateDecision::Rejected(err) => {
            if err.is_unauthorized() {
                debug!(path = %path, "Request rejected: {}", err);
            } else {
                error!(path = %path, "Request gate fault: {}", err);
            }
            Err(err)
        }
    }
}

/// Extract identity from request (use after auth middleware)
pub fn extract_identity(req: &Request) -> Option<&AuthenticatedIdentity> {
    req.extensions().get::<AuthenticatedIdentity>()
}
