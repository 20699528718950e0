use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Which text-structuring backend the extractors use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructurerBackend {
    Llm,
    Rules,
}

impl FromStr for StructurerBackend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(StructurerBackend::Llm),
            "rules" => Ok(StructurerBackend::Rules),
            other => bail!("SCHEDULE_STRUCTURER must be 'llm' or 'rules', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// Optional: without it the LLM backend answers with a configuration error.
    pub anthropic_api_key: Option<String>,
    pub structurer: StructurerBackend,
    pub exam_crawl_url: Option<String>,
    pub crawl_cache_ttl_secs: u64,
    pub crawl_timeout_secs: u64,
    pub extraction_timeout_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            structurer: parse_env("SCHEDULE_STRUCTURER", StructurerBackend::Llm)?,
            exam_crawl_url: optional_env("EXAM_CRAWL_URL"),
            crawl_cache_ttl_secs: parse_env("CRAWL_CACHE_TTL_SECS", 3600)?,
            crawl_timeout_secs: parse_env("CRAWL_TIMEOUT_SECS", 30)?,
            extraction_timeout_secs: parse_env("EXTRACTION_TIMEOUT_SECS", 90)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} is invalid ('{raw}'): {e}")),
        None => Ok(default),
    }
}
