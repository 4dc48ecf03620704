use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::AppConfig;
use crate::ingest::http::build_client;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant unavailable: {0}")]
    Unavailable(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider error: {0}")]
    Provider(String),
}

/// Text in, text out. The chat screen turns any error into an apology.
pub trait Assistant: Send + Sync {
    fn generate_reply(&self, prompt: &str) -> impl Future<Output = Result<String, AssistantError>> + Send;
}

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TOP_K: u32 = 32;
const DEFAULT_TOP_P: f32 = 0.95;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GeminiAssistant {
    model: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
    client: Client,
}

impl GeminiAssistant {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, AssistantError> {
        let base_url = base_url.into();
        let client = build_client(&base_url, REQUEST_TIMEOUT)
            .map_err(|err| AssistantError::Unavailable(err.to_string()))?;
        Ok(Self {
            model: model.into(),
            base_url,
            api_key: api_key.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
            top_p: DEFAULT_TOP_P,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            client,
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &AppConfig) -> Option<Result<Self, AssistantError>> {
        let key = config.gemini_key()?;
        Some(Self::new(
            config.gemini_endpoint.clone(),
            config.gemini_model.clone(),
            key.to_string(),
        ))
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": build_prompt(prompt) }],
                }
            ],
            "generationConfig": {
                "temperature": self.temperature,
                "topK": self.top_k,
                "topP": self.top_p,
                "maxOutputTokens": self.max_output_tokens,
            },
        })
    }
}

impl Assistant for GeminiAssistant {
    async fn generate_reply(&self, prompt: &str) -> Result<String, AssistantError> {
        let base = self.base_url.trim_end_matches('/');
        let url = format!("{}/models/{}:generateContent", base, self.model);
        tracing::debug!(model = %self.model, "generating reply");

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|err| AssistantError::Unavailable(err.to_string()))?;

        let status = response.status();
        let text_body = response
            .text()
            .await
            .map_err(|err| AssistantError::Unavailable(err.to_string()))?;

        if !status.is_success() {
            return Err(AssistantError::Status {
                status: status.as_u16(),
                body: provider_message(&text_body).unwrap_or(text_body),
            });
        }

        let value: Value = serde_json::from_str(&text_body)
            .map_err(|err| AssistantError::Provider(err.to_string()))?;
        extract_reply(&value)
    }
}

fn build_prompt(input: &str) -> String {
    format!("Réponds en français de manière concise et informative à cette question: {input}")
}

/// Joins the text parts of the first candidate. A candidate without text
/// yields an empty string; a response without candidates is an error.
fn extract_reply(value: &Value) -> Result<String, AssistantError> {
    let Some(candidate) = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
    else {
        let reason = value
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .unwrap_or("no candidates returned");
        return Err(AssistantError::Provider(reason.to_string()));
    };

    let text = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();
    Ok(text.trim().to_string())
}

fn provider_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Offline answers used when no provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedAssistant;

impl CannedAssistant {
    pub fn reply_to(question: &str) -> String {
        let lower = question.to_lowercase();
        let reply = if lower.contains("bonjour") {
            "Bonjour ! Comment puis-je vous aider aujourd'hui ?"
        } else if lower.contains("heure") {
            "Il est l'heure de consulter votre montre !"
        } else if lower.contains("isen") {
            "ISEN est une école d'ingénieurs en France."
        } else if lower.contains("android") {
            "Android est un système d'exploitation mobile développé par Google."
        } else if lower.contains("kotlin") {
            "Kotlin est un langage de programmation moderne utilisé pour le développement Android."
        } else if lower.contains("jetpack compose") {
            "Jetpack Compose est une boîte à outils moderne pour créer des interfaces utilisateur Android."
        } else if question.chars().count() < 5 {
            "Pourriez-vous me donner plus de détails ?"
        } else {
            "Je ne suis pas sûr de comprendre votre question. Pouvez-vous reformuler ?"
        };
        reply.to_string()
    }
}

impl Assistant for CannedAssistant {
    async fn generate_reply(&self, prompt: &str) -> Result<String, AssistantError> {
        Ok(Self::reply_to(prompt))
    }
}

/// Whichever assistant the configuration allows.
pub enum ConfiguredAssistant {
    Gemini(GeminiAssistant),
    Canned(CannedAssistant),
}

impl ConfiguredAssistant {
    pub fn from_config(config: &AppConfig) -> Self {
        match GeminiAssistant::from_config(config) {
            Some(Ok(gemini)) => ConfiguredAssistant::Gemini(gemini),
            Some(Err(err)) => {
                tracing::warn!("gemini assistant unavailable, using offline replies: {err}");
                ConfiguredAssistant::Canned(CannedAssistant)
            }
            None => {
                tracing::info!("no gemini api key configured, using offline replies");
                ConfiguredAssistant::Canned(CannedAssistant)
            }
        }
    }
}

impl Assistant for ConfiguredAssistant {
    async fn generate_reply(&self, prompt: &str) -> Result<String, AssistantError> {
        match self {
            ConfiguredAssistant::Gemini(gemini) => gemini.generate_reply(prompt).await,
            ConfiguredAssistant::Canned(canned) => canned.generate_reply(prompt).await,
        }
    }
}
