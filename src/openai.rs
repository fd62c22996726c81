//! Minimal OpenAI-compatible chat client implementing `ContentGenerator`.
//!
//! Plain mode returns the completion text. JSON mode additionally asks for a
//! `json_object` response format; the text still goes through the defensive
//! parser because compatible servers do not always honour it.
//!
//! NOTE: We never log the API key, and responses are logged by size only.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::content::ContentGenerator;
use crate::error::ContentError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone)]
pub struct OpenAI {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Build from env. `api_key` overrides `OPENAI_API_KEY` when given.
  /// Returns None when no key is available or the client cannot be built.
  pub fn from_env(api_key: Option<String>) -> Option<Self> {
    let api_key = api_key
      .or_else(|| std::env::var("OPENAI_API_KEY").ok())
      .map(|k| k.trim().to_string())
      .filter(|k| !k.is_empty())?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

    // No timeout unless asked for: a stalled call stalls the run.
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = std::env::var("OPENAI_TIMEOUT_SECS").ok().and_then(|s| s.parse::<u64>().ok()) {
      builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder.build().ok()?;

    Some(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model })
  }

  #[instrument(level = "info", skip(self, system, user, response_format), fields(model = %self.model, json = response_format.is_some()))]
  async fn chat(
    &self,
    system: &str,
    user: &str,
    temperature: f32,
    response_format: Option<ResponseFormat>,
  ) -> Result<String, ContentError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format,
    };

    let start = Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "survival/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await
      .map_err(|e| ContentError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      error!(target: "openai", %status, elapsed = ?start.elapsed(), "chat completion failed");
      return Err(ContentError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| ContentError::Transport(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "openai", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .unwrap_or_default()
      .trim()
      .to_string();
    debug!(target: "openai", elapsed = ?start.elapsed(), response_chars = text.chars().count(), "chat completion received");
    Ok(text)
  }
}

impl ContentGenerator for OpenAI {
  async fn generate(&self, system: &str, user: &str, temperature: f32) -> Result<String, ContentError> {
    self.chat(system, user, temperature, None).await
  }

  async fn generate_json(&self, system: &str, user: &str, temperature: f32) -> Result<String, ContentError> {
    self.chat(system, user, temperature, Some(ResponseFormat { r#type: "json_object".into() })).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
