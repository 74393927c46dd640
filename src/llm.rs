//! Farming recommendations from the LLM vendor.
//!
//! The vendor uses an OAuth2 API-key grant: the API key is exchanged for a
//! short-lived bearer token, which is cached until shortly before it expires.
//! The chat reply is expected to contain a JSON array of recommendations,
//! possibly wrapped in prose, so the array is cut out of the text before parsing.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{ServiceError, ServiceResult};
use crate::fallback::race;
use crate::models::{SensorData, SensorParameter};
use crate::weather::Weather;

// ---

const GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
/// Refresh the token this long before the vendor says it expires.
const REFRESH_MARGIN_SECS: i64 = 60;
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;
const MAX_TOKENS: u32 = 900;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    #[serde(default = "medium")]
    pub priority: String,
    #[serde(default = "general")]
    pub category: String,
}

fn medium() -> String {
    "medium".into()
}

fn general() -> String {
    "general".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationSet {
    pub source: RecommendationSource,
    pub recommendations: Vec<Recommendation>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Absolute expiry as a unix timestamp, preferred when present.
    #[serde(default)]
    expiration: Option<i64>,
}

impl TokenResponse {
    fn into_cached(self, now: DateTime<Utc>) -> CachedToken {
        // ---
        // Out-of-range vendor values fall back to the default lifetime.
        let relative = self
            .expires_in
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
        let expires_at = self
            .expiration
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or(relative)
            .unwrap_or_else(|| now + TimeDelta::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
        CachedToken {
            access_token: self.access_token,
            expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    // ---
    http: reqwest::Client,
    token_url: Option<String>,
    chat_url: Option<String>,
    api_key: Option<String>,
    model: String,
    project_id: Option<String>,
    timeout: Duration,
    token: Arc<Mutex<Option<CachedToken>>>,
}

pub struct LlmSettings {
    pub token_url: Option<String>,
    pub chat_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub project_id: Option<String>,
    pub timeout: Duration,
}

impl LlmClient {
    pub fn new(http: reqwest::Client, settings: LlmSettings) -> Self {
        // ---
        LlmClient {
            http,
            token_url: settings.token_url,
            chat_url: settings.chat_url,
            api_key: settings.api_key,
            model: settings.model,
            project_id: settings.project_id,
            timeout: settings.timeout,
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// Recommendations for the current conditions. Never fails: any problem
    /// with the vendor yields the fixed fallback set.
    pub async fn recommendations(
        &self,
        reading: Option<&SensorData>,
        weather: &Weather,
    ) -> RecommendationSet {
        // ---
        let prompt = build_prompt(reading, weather);
        let (source, recommendations) =
            match race("recommendations", self.timeout, self.generate(&prompt)).await {
                Ok(recs) => (RecommendationSource::Llm, recs),
                Err(ServiceError::NotConfigured(what)) => {
                    tracing::debug!("LLM not configured ({}), using fallback", what);
                    (RecommendationSource::Fallback, fallback_recommendations())
                }
                Err(e) => {
                    tracing::warn!("LLM recommendations failed, using fallback: {}", e);
                    (RecommendationSource::Fallback, fallback_recommendations())
                }
            };
        RecommendationSet {
            source,
            recommendations,
            generated_at: Utc::now(),
        }
    }

    async fn generate(&self, prompt: &str) -> ServiceResult<Vec<Recommendation>> {
        // ---
        let chat_url = self
            .chat_url
            .as_deref()
            .ok_or(ServiceError::NotConfigured("LLM_CHAT_URL"))?;
        let token = self.access_token().await?;

        let body = ChatRequest {
            model_id: &self.model,
            project_id: self.project_id.as_deref(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: 0.3,
        };

        let resp = self
            .http
            .post(chat_url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            if status.as_u16() == 401 {
                // Revoked before its stated expiry; force a new exchange next time.
                *self.token.lock().await = None;
            }
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        let reply: ChatResponse = serde_json::from_str(&text)?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ServiceError::Validation("chat reply has no choices".into()))?;
        parse_recommendations(&content)
    }

    /// Cached bearer token, exchanged again when missing or about to expire.
    async fn access_token(&self) -> ServiceResult<String> {
        // ---
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let token_url = self
            .token_url
            .as_deref()
            .ok_or(ServiceError::NotConfigured("LLM_TOKEN_URL"))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ServiceError::NotConfigured("LLM_API_KEY"))?;

        tracing::debug!("Exchanging LLM API key for a bearer token");
        let resp = self
            .http
            .post(token_url)
            .form(&[("grant_type", GRANT_TYPE), ("apikey", api_key)])
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        let fresh = serde_json::from_str::<TokenResponse>(&text)?.into_cached(Utc::now());
        tracing::debug!("LLM token valid until {}", fresh.expires_at);
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }
}

const SYSTEM_PROMPT: &str = "You are an agronomy assistant for smallholder farmers. \
Answer only with a JSON array of 3 to 5 objects, each with the keys \
\"title\", \"description\", \"priority\" (high, medium or low) and \"category\" \
(irrigation, fertilization, climate, pest_control or general).";

pub fn build_prompt(reading: Option<&SensorData>, weather: &Weather) -> String {
    // ---
    let mut prompt = String::from("Current farm conditions:\n");
    match reading {
        Some(reading) => {
            for p in SensorParameter::ALL {
                let (min, max) = p.default_range();
                prompt.push_str(&format!(
                    "- {}: {} {} (typical {}-{})\n",
                    p.label(),
                    reading.readings.value(p),
                    p.unit(),
                    min,
                    max
                ));
            }
        }
        None => prompt.push_str("- No recent sensor reading is available.\n"),
    }
    prompt.push_str(&format!(
        "Weather in {}: {}, {} °C, {}% humidity, wind {} m/s.\n",
        weather.location, weather.description, weather.temperature, weather.humidity, weather.wind_speed
    ));
    prompt.push_str("Give practical recommendations for the next 24 hours.");
    prompt
}

/// Parse the JSON array embedded in `content`.
pub fn parse_recommendations(content: &str) -> ServiceResult<Vec<Recommendation>> {
    // ---
    let (start, end) = match (content.find('['), content.rfind(']')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(ServiceError::Validation(
                "reply contains no JSON array".into(),
            ))
        }
    };
    let mut recs: Vec<Recommendation> = serde_json::from_str(&content[start..=end])?;
    if recs.is_empty() {
        return Err(ServiceError::Validation("reply contains no recommendations".into()));
    }
    for rec in &mut recs {
        rec.priority = rec.priority.trim().to_ascii_lowercase();
        rec.category = rec.category.trim().to_ascii_lowercase();
    }
    Ok(recs)
}

pub fn fallback_recommendations() -> Vec<Recommendation> {
    // ---
    vec![
        Recommendation {
            title: "Check soil moisture before irrigating".into(),
            description: "Irrigate early in the morning only where soil moisture is below 30% \
                          to limit evaporation losses."
                .into(),
            priority: "high".into(),
            category: "irrigation".into(),
        },
        Recommendation {
            title: "Monitor nutrient levels".into(),
            description: "Compare N, P and K readings with your crop's needs and plan \
                          fertilizer application accordingly."
                .into(),
            priority: "medium".into(),
            category: "fertilization".into(),
        },
        Recommendation {
            title: "Inspect crops for pests".into(),
            description: "Warm, humid conditions favour pests and fungal disease; \
                          inspect leaves regularly."
                .into(),
            priority: "low".into(),
            category: "pest_control".into(),
        },
    ]
}
