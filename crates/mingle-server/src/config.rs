use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub otp_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("MINGLE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MINGLE_JWT_SECRET is unset or still a placeholder");
        }

        let port = parse_or(&get, "MINGLE_PORT", 3000u16)?;
        let token_ttl_days = parse_or(&get, "MINGLE_TOKEN_TTL_DAYS", 30i64)?;
        let otp_ttl_minutes = parse_or(&get, "MINGLE_OTP_TTL_MINUTES", 10i64)?;
        if token_ttl_days <= 0 || otp_ttl_minutes <= 0 {
            bail!("token and code lifetimes must be positive");
        }

        Ok(Config {
            host: get("MINGLE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: get("MINGLE_DB_PATH").unwrap_or_else(|| "mingle.db".into()).into(),
            jwt_secret,
            token_ttl_days,
            otp_ttl_minutes,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("Invalid {key}: '{raw}'")),
        None => Ok(default),
    }
}
