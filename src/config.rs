//! Process configuration, read once from the environment at start-up.

use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_HF_API_BASE: &str = "https://router.huggingface.co/hf-inference";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub sentiment: SentimentConfig,
    pub key_points: KeyPointsConfig,
}

/// Hugging Face inference settings for the sentiment classifier.
#[derive(Debug, Clone)]
pub struct SentimentConfig {
    pub api_token: Option<String>,
    pub api_base: String,
}

/// Gemini settings for the key-point extractor.
#[derive(Debug, Clone)]
pub struct KeyPointsConfig {
    pub api_key: Option<String>,
    pub api_base: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("invalid DATABASE_MAX_CONNECTIONS: {}", v))?,
            Err(_) => 5,
        };

        let port = match env::var("PORT") {
            Ok(v) => v.parse().with_context(|| format!("invalid PORT: {}", v))?,
            Err(_) => 6543,
        };

        Ok(Self {
            database_url,
            max_connections,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            sentiment: SentimentConfig {
                api_token: non_empty_var("HF_API_TOKEN"),
                api_base: non_empty_var("HF_API_BASE")
                    .unwrap_or_else(|| DEFAULT_HF_API_BASE.to_string()),
            },
            key_points: KeyPointsConfig {
                api_key: non_empty_var("GEMINI_API_KEY"),
                api_base: non_empty_var("GEMINI_API_BASE")
                    .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Blank values count as unset so a `KEY=` line in `.env` disables the provider.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
