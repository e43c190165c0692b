use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::{DEFAULT_API_URL, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
///
/// Collaborator settings (database, object storage, LLM credentials) are optional:
/// when absent the server falls back to in-process stores or reports the AI service
/// as unavailable instead of refusing to start.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub database: Option<DatabaseConfig>,
    pub object_store: Option<ObjectStoreConfig>,
    pub llm: LlmSettings,
    pub status_cache_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub table_name: String,
    pub connect_timeout: Duration,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let database = match get("DATABASE_URL") {
            Some(url) => {
                let table_name =
                    get("ANALYSIS_TABLE_NAME").unwrap_or_else(|| "resume_analyses".to_string());
                validate_identifier(&table_name)?;
                Some(DatabaseConfig {
                    url,
                    table_name,
                    connect_timeout: Duration::from_secs(parse_or(
                        &get,
                        "DB_CONNECT_TIMEOUT_SECS",
                        5u64,
                    )?),
                    max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10u32)?,
                })
            }
            None => None,
        };

        let object_store = get("S3_BUCKET").map(|bucket| ObjectStoreConfig {
            bucket,
            endpoint: get("S3_ENDPOINT"),
            region: get("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id: get("AWS_ACCESS_KEY_ID"),
            secret_access_key: get("AWS_SECRET_ACCESS_KEY"),
        });

        let llm = LlmSettings {
            api_key: get("ANTHROPIC_API_KEY"),
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_url: get("LLM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout: Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", 60u64)?),
        };

        Ok(Config {
            port: parse_or(&get, "PORT", 8080u16)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            database,
            object_store,
            llm,
            status_cache_ttl: Duration::from_secs(parse_or(&get, "STATUS_CACHE_TTL_SECS", 30u64)?),
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are accepted.
fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("ANALYSIS_TABLE_NAME '{name}' is not a valid SQL identifier");
    }
    Ok(())
}
