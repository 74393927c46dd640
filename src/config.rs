//! Configuration loader for the `agridash-gateway` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
use std::{env, time::Duration};

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable, treating blank values as unset.
fn optional_env(var_name: &str) -> Option<String> {
    // ---
    env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional boolean flag (`1|true|yes|on`).
fn parse_env_flag(var_name: &str) -> bool {
    // ---
    matches!(
        env::var(var_name).as_deref().map(str::to_ascii_lowercase).as_deref(),
        Ok("1") | Ok("true") | Ok("yes") | Ok("on")
    )
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Base URL of the backend-as-a-service project (REST and auth live under it).
    pub baas_url: String,

    /// Public (anon) key sent as `apikey` on every BaaS request.
    pub baas_anon_key: String,

    /// Service-role key. Device ingestion is disabled without it.
    pub baas_service_key: Option<String>,

    /// Socket address the HTTP server binds to.
    pub bind_addr: String,

    /// Upper bound for table queries, in milliseconds.
    pub query_timeout_ms: u32,

    /// Upper bound for auth calls, in milliseconds.
    pub auth_timeout_ms: u32,

    /// Upper bound for weather calls, in milliseconds.
    pub weather_timeout_ms: u32,

    pub weather_api_url: Option<String>,
    pub weather_api_key: Option<String>,
    pub weather_location: String,

    /// OAuth2 token endpoint for the LLM vendor.
    pub llm_token_url: Option<String>,
    /// Chat-completion endpoint for the LLM vendor.
    pub llm_chat_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_project_id: Option<String>,

    /// Destination for threshold alert webhooks.
    pub alert_webhook_url: Option<String>,

    /// Serve synthetic readings instead of querying the BaaS.
    pub demo_mode: bool,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `BAAS_URL` – backend project base URL
/// - `BAAS_ANON_KEY` – public API key
///
/// Optional:
/// - `BAAS_SERVICE_KEY` – service-role key (enables `/ingest`)
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:8080`)
/// - `QUERY_TIMEOUT_MS` (default: 5000), `AUTH_TIMEOUT_MS` (default: 10000),
///   `WEATHER_TIMEOUT_MS` (default: 3000)
/// - `WEATHER_API_URL`, `WEATHER_API_KEY`, `WEATHER_LOCATION` (default: `Nairobi`)
/// - `LLM_TOKEN_URL`, `LLM_CHAT_URL`, `LLM_API_KEY`, `LLM_MODEL`, `LLM_PROJECT_ID`
/// - `ALERT_WEBHOOK_URL`
/// - `DEMO_MODE` (default: false)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let baas_url = require_env!("BAAS_URL");
    let baas_anon_key = require_env!("BAAS_ANON_KEY");
    let query_timeout_ms = parse_env_u32!("QUERY_TIMEOUT_MS", 5_000);
    let auth_timeout_ms = parse_env_u32!("AUTH_TIMEOUT_MS", 10_000);
    let weather_timeout_ms = parse_env_u32!("WEATHER_TIMEOUT_MS", 3_000);

    Ok(Config {
        baas_url: baas_url.trim_end_matches('/').to_string(),
        baas_anon_key,
        baas_service_key: optional_env("BAAS_SERVICE_KEY"),
        bind_addr: optional_env("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
        query_timeout_ms,
        auth_timeout_ms,
        weather_timeout_ms,
        weather_api_url: optional_env("WEATHER_API_URL"),
        weather_api_key: optional_env("WEATHER_API_KEY"),
        weather_location: optional_env("WEATHER_LOCATION").unwrap_or_else(|| "Nairobi".into()),
        llm_token_url: optional_env("LLM_TOKEN_URL"),
        llm_chat_url: optional_env("LLM_CHAT_URL"),
        llm_api_key: optional_env("LLM_API_KEY"),
        llm_model: optional_env("LLM_MODEL")
            .unwrap_or_else(|| "ibm/granite-3-8b-instruct".into()),
        llm_project_id: optional_env("LLM_PROJECT_ID"),
        alert_webhook_url: optional_env("ALERT_WEBHOOK_URL"),
        demo_mode: parse_env_flag("DEMO_MODE"),
    })
}

/// Replace all but the last four characters of a secret.
pub(crate) fn mask_secret(secret: &str) -> String {
    // ---
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

fn mask_opt(secret: &Option<String>) -> String {
    secret.as_deref().map(mask_secret).unwrap_or_else(|| "<unset>".into())
}

fn show_opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("<unset>")
}

impl Config {
    /// Minimal configuration pointing at `baas_url`, used by tests and tooling.
    pub fn for_baas(baas_url: &str, anon_key: &str) -> Self {
        // ---
        Config {
            baas_url: baas_url.trim_end_matches('/').to_string(),
            baas_anon_key: anon_key.to_string(),
            baas_service_key: None,
            bind_addr: "127.0.0.1:0".into(),
            query_timeout_ms: 5_000,
            auth_timeout_ms: 10_000,
            weather_timeout_ms: 3_000,
            weather_api_url: None,
            weather_api_key: None,
            weather_location: "Nairobi".into(),
            llm_token_url: None,
            llm_chat_url: None,
            llm_api_key: None,
            llm_model: "ibm/granite-3-8b-instruct".into(),
            llm_project_id: None,
            alert_webhook_url: None,
            demo_mode: false,
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms as u64)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms as u64)
    }

    pub fn weather_timeout(&self) -> Duration {
        Duration::from_millis(self.weather_timeout_ms as u64)
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks keys and tokens while showing all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  BAAS_URL           : {}", self.baas_url);
        tracing::info!("  BAAS_ANON_KEY      : {}", mask_secret(&self.baas_anon_key));
        tracing::info!("  BAAS_SERVICE_KEY   : {}", mask_opt(&self.baas_service_key));
        tracing::info!("  BIND_ADDR          : {}", self.bind_addr);
        tracing::info!("  QUERY_TIMEOUT_MS   : {}", self.query_timeout_ms);
        tracing::info!("  AUTH_TIMEOUT_MS    : {}", self.auth_timeout_ms);
        tracing::info!("  WEATHER_TIMEOUT_MS : {}", self.weather_timeout_ms);
        tracing::info!("  WEATHER_API_URL    : {}", show_opt(&self.weather_api_url));
        tracing::info!("  WEATHER_API_KEY    : {}", mask_opt(&self.weather_api_key));
        tracing::info!("  WEATHER_LOCATION   : {}", self.weather_location);
        tracing::info!("  LLM_TOKEN_URL      : {}", show_opt(&self.llm_token_url));
        tracing::info!("  LLM_CHAT_URL       : {}", show_opt(&self.llm_chat_url));
        tracing::info!("  LLM_API_KEY        : {}", mask_opt(&self.llm_api_key));
        tracing::info!("  LLM_MODEL          : {}", self.llm_model);
        tracing::info!("  LLM_PROJECT_ID     : {}", show_opt(&self.llm_project_id));
        tracing::info!("  ALERT_WEBHOOK_URL  : {}", show_opt(&self.alert_webhook_url));
        tracing::info!("  DEMO_MODE          : {}", self.demo_mode);
    }
}
