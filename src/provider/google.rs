//! Google Gemini generateContent adapter with search grounding.
//!
//! Extends the shared prompt with a search-strategy suffix and, when
//! enabled, attaches the live `google_search` tool to the request. The
//! required output shape is unchanged from the base template.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{GoogleConfig, TEMPERATURE};
use crate::dataset::PharmacyRecord;
use crate::prompt;

use super::error::ProviderError;
use super::ValidationProvider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

pub struct GoogleAdapter {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    enable_search_grounding: bool,
    enable_url_grounding: bool,
}

impl GoogleAdapter {
    pub fn new(config: &GoogleConfig, max_output_tokens: u32) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let key_value = HeaderValue::from_str(&config.api_key)
            .map_err(|_| ProviderError::config("invalid Google API key format"))?;
        headers.insert("x-goog-api-key", key_value);

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
            enable_search_grounding: config.enable_search_grounding,
            enable_url_grounding: config.enable_url_grounding,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[async_trait]
impl ValidationProvider for GoogleAdapter {
    fn name(&self) -> &'static str {
        "google"
    }

    fn label(&self) -> String {
        format!("Google {}", self.model)
    }

    fn build_prompt(&self, batch: &[PharmacyRecord]) -> String {
        let mut text = prompt::render_batch_prompt(batch);
        if let Some(suffix) =
            prompt::grounding_suffix(self.enable_search_grounding, self.enable_url_grounding)
        {
            text.push_str(&suffix);
        }
        text
    }

    async fn call(&self, user_prompt: &str) -> Result<String, ProviderError> {
        let tools = self
            .enable_search_grounding
            .then(|| vec![json!({"google_search": {}})]);

        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: user_prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: self.max_output_tokens,
            },
            tools,
        };

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(parsed) = serde_json::from_str::<GenerateResponse>(&body) {
                if let Some(error) = parsed.error {
                    return Err(ProviderError::backend(
                        "google",
                        error.message.unwrap_or_default(),
                    ));
                }
            }
            return Err(ProviderError::backend(
                "google",
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::backend("google", format!("invalid JSON: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(ProviderError::backend(
                "google",
                error.message.unwrap_or_default(),
            ));
        }

        let text: String = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .map(|parts| {
                parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::backend("google", "no candidates in response"));
        }
        Ok(text)
    }
}
