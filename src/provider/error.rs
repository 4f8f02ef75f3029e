//! Error types for the provider adapters.

use thiserror::Error;

/// Errors raised inside an adapter before fallback conversion.
///
/// None of these cross the `validate_batch` boundary; they exist so the
/// fallback reasoning strings can distinguish transport failures from
/// unusable replies.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Backend construction failed (bad credential format, bad client).
    #[error("configuration error: {0}")]
    Config(String),

    /// The backend answered with an error payload or an unusable status.
    #[error("{provider} error: {message}")]
    Backend {
        provider: &'static str,
        message: String,
    },

    /// Network or HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The reply text carried no decodable JSON verdict object.
    #[error("unusable oracle reply: {0}")]
    Parse(String),
}

impl ProviderError {
    pub fn backend(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            provider,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Whether this failure happened while decoding the reply, as opposed
    /// to contacting the backend.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}
