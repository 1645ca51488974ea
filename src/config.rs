//! Service configuration
//!
//! Optional TOML file, then environment overrides. The signing key is never
//! part of this struct; it is read separately from `JWT_SECRET`.

use crate::auth::{AuthError, AuthResult};
use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// SQLite file holding accounts
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// `iss` claim written to and required from every token
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Token lifetime in hours
    #[serde(default = "default_ttl_hours")]
    pub token_ttl_hours: i64,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    /// Paths exempt from the bearer check (`prefix/**` covers a subtree)
    #[serde(default = "default_public_routes")]
    pub public_routes: Vec<String>,

    /// Reject tokens whose account has since been deleted
    #[serde(default)]
    pub recheck_accounts: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            issuer: default_issuer(),
            token_ttl_hours: default_ttl_hours(),
            bcrypt_cost: default_bcrypt_cost(),
            public_routes: default_public_routes(),
            recheck_accounts: false,
        }
    }
}

impl AuthConfig {
    /// Token lifetime as a duration. Values chrono cannot represent are a
    /// signing fault, the same as a non-positive lifetime.
    pub fn token_ttl(&self) -> AuthResult<Duration> {
        Duration::try_hours(self.token_ttl_hours).ok_or_else(|| {
            AuthError::TokenSigning(format!(
                "token_ttl_hours out of range: {}",
                self.token_ttl_hours
            ))
        })
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_db_path() -> String {
    "vollmed_auth.db".to_string()
}

fn default_issuer() -> String {
    crate::auth::jwt::DEFAULT_ISSUER.to_string()
}

fn default_ttl_hours() -> i64 {
    crate::auth::jwt::DEFAULT_TTL_HOURS
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_public_routes() -> Vec<String> {
    ["/login", "/error", "/swagger-ui/**", "/health"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` if it exists (defaults otherwise), then apply env overrides.
    pub fn from_file_and_env(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from `lookup` (normally the process environment).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup("BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("AUTH_DB_PATH") {
            self.auth.db_path = v;
        }
        if let Some(v) = lookup("JWT_ISSUER") {
            self.auth.issuer = v;
        }
        if let Some(v) = lookup("JWT_TTL_HOURS") {
            self.auth.token_ttl_hours = v
                .parse()
                .with_context(|| format!("JWT_TTL_HOURS is not a number: {}", v))?;
        }
        if let Some(v) = lookup("BCRYPT_COST") {
            self.auth.bcrypt_cost = v
                .parse()
                .with_context(|| format!("BCRYPT_COST is not a number: {}", v))?;
        }
        if let Some(v) = lookup("AUTH_RECHECK_ACCOUNTS") {
            self.auth.recheck_accounts = matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.auth.issuer, "API Voll.med");
        assert_eq!(config.auth.token_ttl_hours, 2);
        assert!(config.auth.public_routes.contains(&"/login".to_string()));
        assert!(config.auth.public_routes.contains(&"/swagger-ui/**".to_string()));
        assert!(!config.auth.recheck_accounts);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[auth]\ntoken_ttl_hours = 1\nrecheck_accounts = true").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.auth.token_ttl_hours, 1);
        assert!(config.auth.recheck_accounts);
        assert_eq!(config.auth.issuer, "API Voll.med");
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::from_file_and_env("/definitely/not/here.toml").unwrap();
        assert_eq!(config.auth.db_path, "vollmed_auth.db");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_TTL_HOURS", "4"),
            ("AUTH_RECHECK_ACCOUNTS", "true"),
            ("JWT_ISSUER", "   "),
        ]);

        let mut config = Config::default();
        config
            .apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.auth.token_ttl_hours, 4);
        assert!(config.auth.recheck_accounts);
        // blank values are ignored
        assert_eq!(config.auth.issuer, "API Voll.med");
    }

    #[test]
    fn test_bad_numeric_override_is_error() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|k| {
            (k == "JWT_TTL_HOURS").then(|| "two".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_huge_ttl_is_an_error_not_a_panic() {
        let mut config = Config::default();
        config
            .apply_env_overrides(|k| (k == "JWT_TTL_HOURS").then(|| i64::MAX.to_string()))
            .unwrap();

        assert!(matches!(
            config.auth.token_ttl(),
            Err(AuthError::TokenSigning(_))
        ));
    }

    #[test]
    fn test_token_ttl_in_hours() {
        let config = Config::default();
        assert_eq!(config.auth.token_ttl().unwrap(), Duration::hours(2));
    }
}
