//! Request Gate
//! Mission: Decide, per request and with no stored session, who gets in

use crate::auth::{
    error::{AuthError, TokenRejection},
    jwt::JwtHandler,
    models::AuthenticatedIdentity,
    user_store::CredentialStore,
};
use axum::http::HeaderMap;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use std::sync::Arc;
use tracing::debug;

/// One allow-list entry: an exact path, or `prefix/**` for a whole subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RoutePattern {
    Exact(String),
    Subtree(String),
}

impl RoutePattern {
    fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix("/**") {
            Some(prefix) => RoutePattern::Subtree(prefix.to_string()),
            None => RoutePattern::Exact(pattern.to_string()),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Exact(exact) => path == exact,
            RoutePattern::Subtree(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }
}

/// Paths reachable without a token, regardless of method.
#[derive(Debug, Clone, Default)]
pub struct PublicRoutes {
    patterns: Vec<RoutePattern>,
}

impl PublicRoutes {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| RoutePattern::parse(p.as_ref()))
                .collect(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Outcome of gating one request
#[derive(Debug)]
pub enum GateDecision {
    /// `None` for allow-listed paths, which carry no identity.
    Admitted(Option<AuthenticatedIdentity>),
    Rejected(AuthError),
}

impl GateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GateDecision::Admitted(_))
    }
}

/// Per-request decision point. Holds only read-only state.
pub struct RequestGate {
    public_routes: PublicRoutes,
    jwt_handler: Arc<JwtHandler>,
    account_check: Option<Arc<dyn CredentialStore>>,
}

impl RequestGate {
    pub fn new(public_routes: PublicRoutes, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            public_routes,
            jwt_handler,
            account_check: None,
        }
    }

    /// Also require the token's subject to still exist in `store`.
    pub fn with_account_check(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.account_check = Some(store);
        self
    }

    pub fn public_routes(&self) -> &PublicRoutes {
        &self.public_routes
    }

    pub async fn authorize(&self, path: &str, headers: &HeaderMap) -> GateDecision {
        if self.public_routes.is_public(path) {
            return GateDecision::Admitted(None);
        }

        let token = match bearer_token(headers) {
            Ok(token) => token,
            Err(err) => return GateDecision::Rejected(err),
        };

        let identity = match self.jwt_handler.verify(&token) {
            Ok(identity) => identity,
            Err(err) => return GateDecision::Rejected(err),
        };

        if let Some(store) = &self.account_check {
            match store.find_by_login(&identity.login).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!("Token subject {} no longer exists", identity.login);
                    return GateDecision::Rejected(AuthError::InvalidToken(
                        TokenRejection::UnknownAccount,
                    ));
                }
                Err(e) => return GateDecision::Rejected(AuthError::Store(e)),
            }
        }

        GateDecision::Admitted(Some(identity))
    }
}

/// Pull the bearer credential out of the `Authorization` header.
///
/// Absent header is [`AuthError::MissingCredential`]; any other scheme or an
/// unparsable value is a malformed token.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    match headers.typed_try_get::<Authorization<Bearer>>() {
        Ok(Some(auth)) => Ok(auth.token().to_string()),
        Ok(None) => Err(AuthError::MissingCredential),
        Err(_) => Err(AuthError::InvalidToken(TokenRejection::Malformed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        jwt::{ManualClock, SecretKey, TokenConfig},
        password::SecretHasher,
        user_store::InMemoryCredentialStore,
    };
    use axum::http::{header, HeaderValue};
    use crate::auth::password::MIN_COST;
    use chrono::Duration;

    const TEST_SECRET: &str = "gate-test-secret-0123456789-abcdefghij";

    fn default_routes() -> PublicRoutes {
        PublicRoutes::new(["/login", "/error", "/swagger-ui/**"])
    }

    fn create_test_gate() -> (RequestGate, Arc<JwtHandler>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let handler = Arc::new(
            JwtHandler::with_clock(TokenConfig::new(SecretKey::new(TEST_SECRET)), clock.clone())
                .unwrap(),
        );
        (RequestGate::new(default_routes(), handler.clone()), handler, clock)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    fn token_for(handler: &JwtHandler, login: &str) -> String {
        handler
            .issue(&AuthenticatedIdentity::from_subject(login))
            .unwrap()
            .0
    }

    #[test]
    fn test_public_route_patterns() {
        let routes = default_routes();

        assert!(routes.is_public("/login"));
        assert!(routes.is_public("/error"));
        assert!(routes.is_public("/swagger-ui"));
        assert!(routes.is_public("/swagger-ui/index.html"));
        assert!(routes.is_public("/swagger-ui/a/b/c"));

        assert!(!routes.is_public("/login/extra"));
        assert!(!routes.is_public("/swagger-uix"));
        assert!(!routes.is_public("/medicos"));
        assert!(!routes.is_public("/"));
    }

    #[tokio::test]
    async fn test_public_route_admitted_without_token() {
        let (gate, _, _) = create_test_gate();

        let decision = gate.authorize("/login", &HeaderMap::new()).await;
        assert!(matches!(decision, GateDecision::Admitted(None)));
    }

    #[tokio::test]
    async fn test_public_route_ignores_bad_token() {
        let (gate, _, _) = create_test_gate();

        let decision = gate.authorize("/login", &bearer("garbage")).await;
        assert!(matches!(decision, GateDecision::Admitted(None)));
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let (gate, _, _) = create_test_gate();

        let decision = gate.authorize("/medicos", &HeaderMap::new()).await;
        assert!(matches!(
            decision,
            GateDecision::Rejected(AuthError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn test_valid_token_admitted_with_identity() {
        let (gate, handler, _) = create_test_gate();
        let token = token_for(&handler, "dr.silva");

        match gate.authorize("/medicos", &bearer(&token)).await {
            GateDecision::Admitted(Some(identity)) => assert_eq!(identity.login, "dr.silva"),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (gate, handler, clock) = create_test_gate();
        let token = token_for(&handler, "dr.silva");

        clock.advance(Duration::hours(2));

        assert!(matches!(
            gate.authorize("/medicos", &bearer(&token)).await,
            GateDecision::Rejected(AuthError::InvalidToken(TokenRejection::Expired))
        ));
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_rejected() {
        let (gate, handler, _) = create_test_gate();
        let token = token_for(&handler, "dr.silva");

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", token)).unwrap(),
        );

        assert!(matches!(
            gate.authorize("/medicos", &headers).await,
            GateDecision::Rejected(AuthError::InvalidToken(TokenRejection::Malformed))
        ));
    }

    #[test]
    fn test_bearer_scheme_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[tokio::test]
    async fn test_account_check_rejects_deleted_account() {
        let (_, handler, _) = create_test_gate();
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .register("dr.silva", "s3cret", &SecretHasher::new(MIN_COST))
            .unwrap();

        let gate = RequestGate::new(default_routes(), handler.clone())
            .with_account_check(store.clone());
        let token = token_for(&handler, "dr.silva");

        assert!(gate.authorize("/medicos", &bearer(&token)).await.is_admitted());

        store.remove("dr.silva");
        assert!(matches!(
            gate.authorize("/medicos", &bearer(&token)).await,
            GateDecision::Rejected(AuthError::InvalidToken(TokenRejection::UnknownAccount))
        ));
    }

    #[tokio::test]
    async fn test_without_account_check_deleted_account_still_admitted() {
        let (gate, handler, _) = create_test_gate();
        // No store involved at all: the token alone decides.
        let token = token_for(&handler, "dr.deleted");

        assert!(gate.authorize("/medicos", &bearer(&token)).await.is_admitted());
    }
}
