//! Secret Hashing
//! Mission: Salted, slow, one-way hashing of account secrets

use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};

/// Cheapest cost bcrypt accepts.
pub const MIN_COST: u32 = 4;

/// bcrypt reads at most this many bytes of a secret and ignores the rest.
pub const MAX_SECRET_LEN: usize = 72;

/// bcrypt-backed hasher. Each hash embeds its own random salt, so equal
/// plaintexts never produce equal blobs.
#[derive(Debug, Clone, Copy)]
pub struct SecretHasher {
    cost: u32,
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl SecretHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext secret. Secrets longer than [`MAX_SECRET_LEN`] bytes
    /// are refused rather than silently truncated.
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        if plaintext.len() > MAX_SECRET_LEN {
            anyhow::bail!(
                "secret is {} bytes, at most {} are supported",
                plaintext.len(),
                MAX_SECRET_LEN
            );
        }
        hash(plaintext, self.cost).context("Failed to hash secret")
    }

    /// Check a plaintext against a stored blob.
    ///
    /// bcrypt compares digests in constant time. A blob that does not parse
    /// counts as a mismatch, and so does a secret over [`MAX_SECRET_LEN`]
    /// bytes. The bcrypt work still runs for an over-long secret so it costs
    /// the same as any other mismatch.
    pub fn verify(&self, plaintext: &str, hash_blob: &str) -> bool {
        let matches = verify(plaintext, hash_blob).unwrap_or(false);
        matches && plaintext.len() <= MAX_SECRET_LEN
    }

    /// [`Self::hash`] on the blocking pool.
    pub async fn hash_blocking(&self, plaintext: &str) -> Result<String> {
        let hasher = *self;
        let plaintext = plaintext.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .context("Hashing task failed")?
    }

    /// [`Self::verify`] on the blocking pool.
    pub async fn verify_blocking(&self, plaintext: &str, hash_blob: &str) -> Result<bool> {
        let hasher = *self;
        let plaintext = plaintext.to_string();
        let hash_blob = hash_blob.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &hash_blob))
            .await
            .context("Verification task failed")
    }
}

/// Cost recorded in a `$2b$NN$...` blob.
pub fn stored_cost(hash_blob: &str) -> Option<u32> {
    let mut parts = hash_blob.split('$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(""), Some(_version), Some(cost)) if cost.len() == 2 => cost.parse().ok(),
        _ => None,
    }
}
