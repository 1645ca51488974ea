//! Login Verification
//! Mission: Turn a login + secret into an identity, or one undifferentiated failure

use crate::auth::{
    error::{AuthError, AuthResult},
    models::AuthenticatedIdentity,
    password::{stored_cost, SecretHasher},
    user_store::CredentialStore,
};
use anyhow::Context;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

const DUMMY_SECRET: &str = "vollmed-timing-equalizer";

/// Checks login attempts against the credential store.
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    hasher: SecretHasher,
    // Verified against when the login is unknown, so both failure paths pay
    // for one bcrypt verification. Follows the cost of the last stored hash seen.
    dummy_hash: RwLock<String>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: SecretHasher) -> anyhow::Result<Self> {
        let dummy_hash = hasher
            .hash(DUMMY_SECRET)
            .context("Failed to prepare dummy hash")?;

        Ok(Self {
            store,
            hasher,
            dummy_hash: RwLock::new(dummy_hash),
        })
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Verify `login` and `secret`.
    ///
    /// Unknown login and wrong secret both yield [`AuthError::InvalidCredentials`].
    /// Store faults surface as [`AuthError::Store`].
    pub async fn authenticate(&self, login: &str, secret: &str) -> AuthResult<AuthenticatedIdentity> {
        let account = self.store.find_by_login(login).await?;

        let hash_blob = match &account {
            Some(account) => account.password_hash.clone(),
            None => self.dummy_hash.read().clone(),
        };

        let matches = self.hasher.verify_blocking(secret, &hash_blob).await?;

        if account.is_some() {
            self.align_dummy_cost(&hash_blob).await;
        }

        match account {
            Some(account) if matches => Ok(AuthenticatedIdentity::from(&account)),
            Some(_) => {
                debug!("Authentication rejected: secret mismatch");
                Err(AuthError::InvalidCredentials)
            }
            None => {
                debug!("Authentication rejected: no such account");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Re-hash the dummy at the cost of `hash_blob` when they differ, so
    /// accounts hashed under an older cost setting keep both paths equally slow.
    async fn align_dummy_cost(&self, hash_blob: &str) {
        let Some(cost) = stored_cost(hash_blob) else {
            return;
        };
        let current = stored_cost(&self.dummy_hash.read());
        if current == Some(cost) {
            return;
        }

        match SecretHasher::new(cost).hash_blocking(DUMMY_SECRET).await {
            Ok(dummy) => {
                debug!("Dummy hash cost aligned to {}", cost);
                *self.dummy_hash.write() = dummy;
            }
            Err(e) => warn!("Failed to re-hash dummy at cost {}: {:#}", cost, e),
        }
    }
}
