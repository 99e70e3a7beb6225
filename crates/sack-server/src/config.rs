use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// JWT secrets that ship in sample `.env` files and must never be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
    "secret",
];

const MIN_SECRET_LEN: usize = 32;

/// Credentials for the admin account created on first start.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Server configuration loaded from environment variables.
///
/// | Env Var                   | Default                 |
/// |---------------------------|-------------------------|
/// | `SACK_HOST`               | `0.0.0.0`               |
/// | `SACK_PORT`               | `3000`                  |
/// | `SACK_DB_PATH`            | `santas-sack.db`        |
/// | `SACK_JWT_SECRET`         | required                |
/// | `SACK_TOKEN_TTL_HOURS`    | `168`                   |
/// | `SACK_IMAGE_DIR`          | `./toy-images`          |
/// | `SACK_PUBLIC_URL`         | `http://localhost:3000` |
/// | `SACK_SESSION_PRUNE_SECS` | `3600`                  |
///
/// `SACK_ADMIN_EMAIL` and `SACK_ADMIN_PASSWORD` (plus optional
/// `SACK_ADMIN_NAME`) enable the bootstrap admin.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub image_dir: PathBuf,
    pub public_url: String,
    pub session_prune_secs: u64,
    pub admin: Option<BootstrapAdmin>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let jwt_secret = lookup("SACK_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SACK_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }
        if jwt_secret.len() < MIN_SECRET_LEN {
            bail!("SACK_JWT_SECRET must be at least {MIN_SECRET_LEN} characters");
        }

        let port: u16 = var("SACK_PORT", "3000")
            .parse()
            .context("SACK_PORT must be a valid port number")?;
        let token_ttl_hours: i64 = var("SACK_TOKEN_TTL_HOURS", "168")
            .parse()
            .context("SACK_TOKEN_TTL_HOURS must be a whole number of hours")?;
        if token_ttl_hours <= 0 {
            bail!("SACK_TOKEN_TTL_HOURS must be positive");
        }
        let session_prune_secs: u64 = var("SACK_SESSION_PRUNE_SECS", "3600")
            .parse()
            .context("SACK_SESSION_PRUNE_SECS must be a whole number of seconds")?;
        if session_prune_secs == 0 {
            bail!("SACK_SESSION_PRUNE_SECS must be positive");
        }

        let admin = match (lookup("SACK_ADMIN_EMAIL"), lookup("SACK_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                full_name: var("SACK_ADMIN_NAME", "Santa"),
            }),
            (None, None) => None,
            _ => bail!("SACK_ADMIN_EMAIL and SACK_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            host: var("SACK_HOST", "0.0.0.0"),
            port,
            db_path: var("SACK_DB_PATH", "santas-sack.db").into(),
            jwt_secret,
            token_ttl_hours,
            image_dir: var("SACK_IMAGE_DIR", "./toy-images").into(),
            public_url: var("SACK_PUBLIC_URL", "http://localhost:3000"),
            session_prune_secs,
            admin,
        })
    }
}
