//! Authentication Models
//! Mission: Keep the stored account apart from the identity derived from it

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stored account record, owned by the credential store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub login: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub created_at: String,
}

impl Account {
    /// Every account carries the same single role.
    pub fn roles(&self) -> BTreeSet<Role> {
        BTreeSet::from([Role::User])
    }
}

/// Roles granted to an authenticated identity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    #[serde(rename = "ROLE_USER")]
    User,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "ROLE_USER",
        }
    }
}

/// Result of a successful login, or of a verified token.
///
/// Never persisted: it is rebuilt from the token on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    pub login: String,
    pub roles: BTreeSet<Role>,
}

impl AuthenticatedIdentity {
    /// Identity for a subject recovered from a token. Roles are not carried in
    /// the token; they come from the fixed role set.
    pub fn from_subject(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            roles: BTreeSet::from([Role::User]),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<&Account> for AuthenticatedIdentity {
    fn from(account: &Account) -> Self {
        Self {
            login: account.login.clone(),
            roles: account.roles(),
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub iss: String,
    pub sub: String, // subject (account login)
    pub iat: i64,
    pub exp: i64,
}

/// Login request body
#[derive(Deserialize)]
pub struct LoginRequest {
    pub login: String,
    #[serde(alias = "senha")]
    pub password: String,
}

// Manual impl so a stray `{:?}` never prints the plaintext secret.
impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}
