//! Provider adapters for the validation oracle.
//!
//! One trait, interchangeable backends. `validate_batch` is the only
//! operation the orchestrator calls, and it cannot fail: backend and
//! parse errors are converted into a [`BatchOutcome::Fallback`] carrying
//! one error-confidence verdict per input record.

pub mod error;
pub mod google;
pub mod openai;
pub mod types;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::{AppConfig, BackendConfig};
use crate::dataset::PharmacyRecord;

pub use error::ProviderError;
pub use google::GoogleAdapter;
pub use openai::OpenAiAdapter;
pub use types::{fallback_verdicts, parse_reply, BatchOutcome, Confidence, Verdict};

/// A backend oracle behind the shared validation contract.
#[async_trait]
pub trait ValidationProvider: Send + Sync {
    /// Short backend name for logs ("openai", "google").
    fn name(&self) -> &'static str;

    /// Backend identity for output column naming, e.g. "OpenAI o3-deep-research".
    fn label(&self) -> String;

    /// Deterministic prompt for a batch. Backends may extend the shared
    /// template with their own directives, never changing the output shape.
    fn build_prompt(&self, batch: &[PharmacyRecord]) -> String;

    /// One synchronous oracle round-trip: prompt text in, raw reply out.
    async fn call(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Validate a batch end to end. Never fails: any error on the way is
    /// converted into fallback verdicts covering the whole batch.
    async fn validate_batch(&self, batch: &[PharmacyRecord]) -> BatchOutcome {
        let prompt = self.build_prompt(batch);
        info!(
            provider = self.name(),
            batch_len = batch.len(),
            "validating batch"
        );

        let raw = match self.call(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(provider = self.name(), error = %e, "backend call failed");
                let reason = format!("API error: {e}");
                return BatchOutcome::Fallback {
                    verdicts: fallback_verdicts(batch.len(), &reason),
                    reason,
                };
            }
        };
        debug!(provider = self.name(), reply = %raw, "oracle reply received");

        match parse_reply(&raw) {
            Ok(verdicts) => {
                info!(
                    provider = self.name(),
                    verdicts = verdicts.len(),
                    "parsed oracle reply"
                );
                BatchOutcome::Parsed(verdicts)
            }
            Err(e) => {
                error!(provider = self.name(), error = %e, reply = %raw, "failed to parse oracle reply");
                let reason = format!("Failed to parse oracle reply: {e}");
                BatchOutcome::Fallback {
                    verdicts: fallback_verdicts(batch.len(), &reason),
                    reason,
                }
            }
        }
    }
}

/// Build the adapter for the configured backend.
///
/// Unknown provider names never reach this point; they are rejected while
/// parsing the configuration, before any network activity.
pub fn from_config(config: &AppConfig) -> Result<Box<dyn ValidationProvider>, ProviderError> {
    match &config.backend {
        BackendConfig::OpenAi(c) => Ok(Box::new(OpenAiAdapter::new(c, config.max_output_tokens)?)),
        BackendConfig::Google(c) => Ok(Box::new(GoogleAdapter::new(c, config.max_output_tokens)?)),
    }
}
