//! Backend-for-frontend gateway for the agricultural IoT dashboard.
//!
//! The dashboard UI talks only to this service. It forwards the caller's
//! session to the hosted backend (database, auth), fronts the weather and
//! LLM vendors, accepts device telemetry and runs the threshold alert
//! pipeline. Module layout follows the Explicit Module Boundary Pattern
//! (EMBP): `routes` only knows the types re-exported here, and `main.rs`
//! only knows [`AppState`], [`Config`] and [`app`].

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::Router;

pub mod appliances;
pub mod baas;
pub mod config;
pub mod demo;
pub mod error;
pub mod fallback;
pub mod llm;
pub mod models;
pub mod notify;
pub mod routes;
pub mod services;
pub mod weather;

pub use config::Config;
pub use error::{ServiceError, ServiceResult};

use appliances::Appliances;
use baas::BaasClient;
use fallback::ReadingCache;
use llm::{LlmClient, LlmSettings};
use notify::Notifier;
use weather::WeatherClient;

// ---

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound for a whole recommendation round trip (token exchange + chat).
const LLM_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared handles passed to every route. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub config: Arc<Config>,
    pub baas: BaasClient,
    pub cache: ReadingCache,
    pub weather: WeatherClient,
    pub llm: LlmClient,
    pub appliances: Appliances,
    pub notifier: Notifier,
}

impl AppState {
    /// Build every client from `config`, sharing one HTTP connection pool.
    pub fn from_config(config: Config) -> Result<Self> {
        // ---
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        let baas = BaasClient::new(
            http.clone(),
            &config.baas_url,
            &config.baas_anon_key,
            config.baas_service_key.clone(),
        );
        let weather = WeatherClient::new(
            http.clone(),
            config.weather_api_url.clone(),
            config.weather_api_key.clone(),
            &config.weather_location,
            config.weather_timeout(),
        );
        let llm = LlmClient::new(
            http.clone(),
            LlmSettings {
                token_url: config.llm_token_url.clone(),
                chat_url: config.llm_chat_url.clone(),
                api_key: config.llm_api_key.clone(),
                model: config.llm_model.clone(),
                project_id: config.llm_project_id.clone(),
                timeout: LLM_TIMEOUT,
            },
        );
        let notifier = Notifier::new(http, config.alert_webhook_url.clone());

        Ok(AppState {
            config: Arc::new(config),
            baas,
            cache: ReadingCache::new(),
            weather,
            llm,
            appliances: Appliances::new(),
            notifier,
        })
    }
}

/// Full HTTP application for `state`.
pub fn app(state: AppState) -> Router {
    routes::router(state)
}
