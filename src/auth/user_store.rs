//! Account Storage
//! Mission: Look up accounts by login for the authenticator

use crate::auth::{models::Account, password::SecretHasher};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Lookup contract consumed by the authenticator and the request gate.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when no account has this login.
    async fn find_by_login(&self, login: &str) -> Result<Option<Account>>;
}

/// Account storage with SQLite backend
pub struct UserStore {
    db_path: String,
}

impl UserStore {
    /// Create a new account store and initialize database
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                login TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create accounts table")?;

        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open account database at {}", self.db_path))
    }

    /// Get account by login
    pub fn get_account_by_login(&self, login: &str) -> Result<Option<Account>> {
        let conn = self.open()?;

        let row = conn
            .query_row(
                "SELECT id, login, password_hash, created_at
                 FROM accounts WHERE login = ?1",
                params![login],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query account")?;

        let Some((id, login, password_hash, created_at)) = row else {
            return Ok(None);
        };

        let id = Uuid::parse_str(&id).with_context(|| format!("Corrupt account id: {}", id))?;

        Ok(Some(Account {
            id,
            login,
            password_hash,
            created_at,
        }))
    }

    /// Create a new account with an already-hashed secret
    pub fn create_account(&self, login: &str, password_hash: String) -> Result<Account> {
        let account = Account {
            id: Uuid::new_v4(),
            login: login.to_string(),
            password_hash,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.open()?;
        conn.execute(
            "INSERT INTO accounts (id, login, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                account.id.to_string(),
                account.login,
                account.password_hash,
                account.created_at,
            ],
        )
        .context("Failed to insert account")?;

        info!("Created account: {}", account.login);

        Ok(account)
    }

    /// Delete an account by login
    pub fn delete_account(&self, login: &str) -> Result<()> {
        let conn = self.open()?;

        let rows_affected =
            conn.execute("DELETE FROM accounts WHERE login = ?1", params![login])?;

        if rows_affected == 0 {
            bail!("Account not found");
        }

        info!("Deleted account: {}", login);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for UserStore {
    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        let store = UserStore {
            db_path: self.db_path.clone(),
        };
        let login = login.to_string();

        tokio::task::spawn_blocking(move || store.get_account_by_login(&login))
            .await
            .context("Account lookup task failed")?
    }
}

/// Map-backed store for embedding and tests.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `password` and register an account under `login`.
    pub fn register(&self, login: &str, password: &str, hasher: &SecretHasher) -> Result<Account> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(login) {
            bail!("Login already exists: {}", login);
        }

        let account = Account {
            id: Uuid::new_v4(),
            login: login.to_string(),
            password_hash: hasher.hash(password)?,
            created_at: Utc::now().to_rfc3339(),
        };
        accounts.insert(login.to_string(), account.clone());
        Ok(account)
    }

    /// Store an account whose hash was produced elsewhere, replacing any
    /// account with the same login.
    pub fn insert(&self, account: Account) -> Option<Account> {
        self.accounts.write().insert(account.login.clone(), account)
    }

    pub fn remove(&self, login: &str) -> Option<Account> {
        self.accounts.write().remove(login)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        Ok(self.accounts.read().get(login).cloned())
    }
}
