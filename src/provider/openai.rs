//! OpenAI chat-completions adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::{OpenAiConfig, TEMPERATURE};
use crate::dataset::PharmacyRecord;
use crate::prompt;

use super::error::ProviderError;
use super::ValidationProvider;

/// Deep-research models can take minutes per batch; the transport timeout
/// is the only timeout in the system.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

pub struct OpenAiAdapter {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_output_tokens: u32,
}

impl OpenAiAdapter {
    pub fn new(config: &OpenAiConfig, max_output_tokens: u32) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| ProviderError::config("invalid OpenAI API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_output_tokens,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: [ApiMessage<'a>; 2],
    temperature: f32,
    max_completion_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<Choice>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[async_trait]
impl ValidationProvider for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn label(&self) -> String {
        format!("OpenAI {}", self.model)
    }

    fn build_prompt(&self, batch: &[PharmacyRecord]) -> String {
        prompt::render_batch_prompt(batch)
    }

    async fn call(&self, user_prompt: &str) -> Result<String, ProviderError> {
        let request = ChatApiRequest {
            model: &self.model,
            messages: [
                ApiMessage {
                    role: "system",
                    content: prompt::SYSTEM_PROMPT,
                },
                ApiMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_completion_tokens: self.max_output_tokens,
        };

        let response = self
            .client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Prefer the API's own error message when the body carries one.
            if let Ok(parsed) = serde_json::from_str::<ChatApiResponse>(&body) {
                if let Some(error) = parsed.error {
                    return Err(ProviderError::backend(
                        "openai",
                        error.message.unwrap_or_default(),
                    ));
                }
            }
            return Err(ProviderError::backend(
                "openai",
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let parsed: ChatApiResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::backend("openai", format!("invalid JSON: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(ProviderError::backend(
                "openai",
                error.message.unwrap_or_default(),
            ));
        }

        parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| ProviderError::backend("openai", "no choices in response"))
    }
}
