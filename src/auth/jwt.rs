//! JWT Token Handler
//! Mission: Mint and check self-contained session tokens

use crate::auth::{
    error::{AuthError, AuthResult, TokenRejection},
    models::{AuthenticatedIdentity, Claims},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};
use tracing::debug;

/// Issuer label written into every token
pub const DEFAULT_ISSUER: &str = "API Voll.med";

/// Token lifetime
pub const DEFAULT_TTL_HOURS: i64 = 2;

/// Shortest accepted HS256 key
pub const MIN_SECRET_LEN: usize = 32;

/// Source of "now", in Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Server-held signing key. `Debug` never prints the bytes.
#[derive(Clone)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Read the key from `var`. Absence is a signing fault.
    pub fn from_env(var: &str) -> AuthResult<Self> {
        std::env::var(var)
            .map(Self::new)
            .map_err(|_| AuthError::TokenSigning(format!("{} is not set", var)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey(<{} bytes redacted>)", self.0.len())
    }
}

/// Everything the issuer and verifier need, built once at startup.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: SecretKey,
    pub issuer: String,
    pub ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: SecretKey) -> Self {
        Self {
            secret,
            issuer: DEFAULT_ISSUER.to_string(),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }
}

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtHandler {
    /// Build a handler on the system clock.
    pub fn new(config: TokenConfig) -> AuthResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a handler and prove it can sign and verify before returning it.
    pub fn with_clock(config: TokenConfig, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        if config.secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::TokenSigning(format!(
                "secret key must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                config.secret.len()
            )));
        }
        if config.ttl <= Duration::zero() {
            return Err(AuthError::TokenSigning(
                "token lifetime must be positive".to_string(),
            ));
        }

        // Expiry is checked against our clock in verify(), with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[config.issuer.as_str()]);

        let handler = Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer,
            ttl: config.ttl,
            clock,
        };

        let probe = AuthenticatedIdentity::from_subject("startup-probe");
        let (token, _) = handler.issue(&probe)?;
        handler.verify(&token).map_err(|e| {
            AuthError::TokenSigning(format!("signing self-check failed: {}", e))
        })?;

        Ok(handler)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a signed token for `identity`. Returns the token and its claims.
    pub fn issue(&self, identity: &AuthenticatedIdentity) -> AuthResult<(String, Claims)> {
        let now = self.clock.now();
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: identity.login.clone(),
            iat: now,
            exp: now + self.ttl.num_seconds(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))?;

        debug!(
            "Issued token for {}, expires in {}s",
            identity.login,
            self.ttl.num_seconds()
        );

        Ok((token, claims))
    }

    /// Check signature, issuer and expiry, then rebuild the identity.
    pub fn verify(&self, token: &str) -> AuthResult<AuthenticatedIdentity> {
        let claims = self.verify_claims(token)?;
        Ok(AuthenticatedIdentity::from_subject(claims.sub))
    }

    /// Like [`Self::verify`] but hands back the raw claims.
    pub fn verify_claims(&self, token: &str) -> AuthResult<Claims> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                let rejection = match e.kind() {
                    ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                    ErrorKind::InvalidIssuer => TokenRejection::WrongIssuer,
                    _ => TokenRejection::Malformed,
                };
                debug!("Rejected token ({}): {}", rejection, e);
                AuthError::InvalidToken(rejection)
            },
        )?;

        let claims = decoded.claims;

        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken(TokenRejection::Malformed));
        }
        if self.clock.now() >= claims.exp {
            debug!("Rejected token for {}: expired", claims.sub);
            return Err(AuthError::InvalidToken(TokenRejection::Expired));
        }

        Ok(claims)
    }
}
