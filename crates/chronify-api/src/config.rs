use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "dev-secret-change-me", "secret"];

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub auth: AuthConfig,
    pub request_timeout: Duration,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
    /// `None` when no API key is set; the AI endpoint then answers 503.
    pub gemini: Option<GeminiConfig>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Config {
    /// Read configuration from the process environment.
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("CHRONIFY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CHRONIFY_JWT_SECRET is unset or still a placeholder");
        }

        let port = match var("CHRONIFY_PORT") {
            Some(v) => v.parse().with_context(|| format!("invalid CHRONIFY_PORT '{}'", v))?,
            None => 8080,
        };
        let ttl_hours: i64 = match var("CHRONIFY_TOKEN_TTL_HOURS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid CHRONIFY_TOKEN_TTL_HOURS '{}'", v))?,
            None => 72,
        };
        if ttl_hours <= 0 {
            bail!("CHRONIFY_TOKEN_TTL_HOURS must be positive, got {}", ttl_hours);
        }
        let token_ttl = chrono::Duration::try_hours(ttl_hours)
            .with_context(|| format!("CHRONIFY_TOKEN_TTL_HOURS {} is out of range", ttl_hours))?;
        let timeout_secs: u64 = match var("CHRONIFY_REQUEST_TIMEOUT_SECS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid CHRONIFY_REQUEST_TIMEOUT_SECS '{}'", v))?,
            None => 15,
        };

        let gemini = var("GEMINI_API_KEY").map(|api_key| GeminiConfig {
            api_key,
            model: var("CHRONIFY_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
            base_url: var("CHRONIFY_GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.into()),
        });

        Ok(Self {
            host: var("CHRONIFY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("CHRONIFY_DB_PATH")
                .unwrap_or_else(|| "chronify.db".into())
                .into(),
            auth: AuthConfig {
                jwt_secret,
                token_ttl,
            },
            request_timeout: Duration::from_secs(timeout_secs),
            cors_origin: var("CHRONIFY_CORS_ORIGIN"),
            gemini,
        })
    }
}
