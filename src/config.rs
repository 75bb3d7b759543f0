use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::services::upstream::ProviderKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub referer: String,
    pub app_title: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub userinfo_url: String,
    pub timeout: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            userinfo_url: DEFAULT_USERINFO_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub upstream: UpstreamConfig,
    pub identity: IdentityConfig,
}

const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let provider = match env::var("UPSTREAM_PROVIDER") {
            Ok(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                key: "UPSTREAM_PROVIDER",
                value: raw.clone(),
                reason,
            })?,
            Err(_) => ProviderKind::ChatCompletions,
        };

        let api_key = env::var("UPSTREAM_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("UPSTREAM_API_KEY"))?;

        let upstream = UpstreamConfig {
            provider,
            api_key,
            base_url: env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| provider.default_base_url().to_string()),
            model: env::var("UPSTREAM_MODEL")
                .unwrap_or_else(|_| provider.default_model().to_string()),
            referer: env::var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            app_title: env::var("UPSTREAM_APP_TITLE")
                .unwrap_or_else(|_| "Arzuno Humanizer".to_string()),
            timeout: Duration::from_secs(parse_var("UPSTREAM_TIMEOUT_SECS", 60)?),
        };

        let identity = IdentityConfig {
            userinfo_url: env::var("IDENTITY_USERINFO_URL")
                .unwrap_or_else(|_| DEFAULT_USERINFO_URL.to_string()),
            timeout: Duration::from_secs(parse_var("IDENTITY_TIMEOUT_SECS", 10)?),
        };

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 20)?,
            port: parse_var("PORT", 3000)?,
            upstream,
            identity,
        })
    }
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
