use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used outside dev mode.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let dev_mode = var("INSIGHT_DEV_MODE").is_some_and(|v| v == "1");

        let jwt_secret = var("INSIGHT_JWT_SECRET").unwrap_or_default();
        let jwt_secret = if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            if !dev_mode {
                bail!("INSIGHT_JWT_SECRET is unset or still a placeholder; set it in .env or set INSIGHT_DEV_MODE=1");
            }
            if jwt_secret.is_empty() { DEV_SECRET.to_string() } else { jwt_secret }
        } else {
            jwt_secret
        };

        let port = match var("INSIGHT_PORT") {
            Some(p) => p.parse().with_context(|| format!("INSIGHT_PORT '{}' is not a port", p))?,
            None => 3000,
        };
        let max_upload_mb: usize = match var("INSIGHT_MAX_UPLOAD_MB") {
            Some(mb) => mb
                .parse()
                .with_context(|| format!("INSIGHT_MAX_UPLOAD_MB '{}' is not a number", mb))?,
            None => 50,
        };

        Ok(Self {
            host: var("INSIGHT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("INSIGHT_DB_PATH").unwrap_or_else(|| "insighthub.db".into()).into(),
            upload_dir: var("INSIGHT_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            jwt_secret,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().with_context(|| format!("invalid listen address '{}'", addr))
    }
}
