//! Run configuration, consolidated from the environment.
//!
//! Every knob the pipeline and the provider adapters recognize is resolved
//! once at startup into an [`AppConfig`] and passed by reference from there
//! on. Nothing below this module reads process environment state, which
//! keeps the core testable with synthetic configs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use thiserror::Error;

/// Sampling temperature sent with every oracle call. Fixed low for
/// run-to-run consistency.
pub const TEMPERATURE: f32 = 0.1;

const DEFAULT_INPUT_FILENAME: &str = "Mail Order Pharmacies by State Jul 31 2025.csv";
const DEFAULT_BATCH_SIZE: usize = 30;
const DEFAULT_DELAY_SECONDS: u64 = 2;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4000;

const DEFAULT_OPENAI_MODEL: &str = "o3-deep-research";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_GOOGLE_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown AI provider '{0}' (supported providers: openai, google)")]
    UnknownProvider(String),

    #[error("{0} not set")]
    MissingKey(&'static str),

    #[error("invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },
}

/// Which oracle backend a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Google,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "google" => Ok(ProviderKind::Google),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Google => "google",
        }
    }
}

/// OpenAI chat-completions backend settings.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Google Gemini backend settings, including the grounding toggles.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Attach the live `google_search` tool and the search-strategy prompt
    /// suffix.
    pub enable_search_grounding: bool,
    /// Append the reference-URL prompt suffix (state board portals, NABP).
    pub enable_url_grounding: bool,
}

/// Backend selection with the settings for the chosen backend only.
///
/// Credentials for the inactive backend are never required.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    OpenAi(OpenAiConfig),
    Google(GoogleConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            BackendConfig::OpenAi(_) => ProviderKind::OpenAi,
            BackendConfig::Google(_) => ProviderKind::Google,
        }
    }

    /// Human-readable backend identity, embedded in the corrected-states
    /// output column name.
    pub fn label(&self) -> String {
        match self {
            BackendConfig::OpenAi(c) => format!("OpenAI {}", c.model),
            BackendConfig::Google(c) => format!("Google {}", c.model),
        }
    }
}

/// CLI-level overrides applied on top of the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<String>,
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub delay_seconds: Option<u64>,
}

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    /// Records per oracle call. The last batch may be shorter.
    pub batch_size: usize,
    /// Fixed pause between consecutive batches.
    pub batch_delay: Duration,
    /// Output-length cap passed to the backend.
    pub max_output_tokens: u32,
    pub data_dir: PathBuf,
    pub input_filename: String,
    pub output_dir: PathBuf,
    /// Stamped with the run start time at config build; fixed for the run.
    pub output_filename: String,
}

impl AppConfig {
    /// Build from the process environment. `.env` loading (if any) must
    /// happen before this is called.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&ConfigOverrides::default())
    }

    /// Build from the environment with CLI overrides layered on top.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let provider_name = overrides
            .provider
            .clone()
            .or_else(|| env_opt("AI_PROVIDER"))
            .unwrap_or_else(|| "openai".to_string());
        let kind = ProviderKind::parse(&provider_name)?;

        let backend = match kind {
            ProviderKind::OpenAi => BackendConfig::OpenAi(OpenAiConfig {
                api_key: env_required("OPENAI_API_KEY")?,
                model: env_or("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
                base_url: env_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            }),
            ProviderKind::Google => BackendConfig::Google(GoogleConfig {
                api_key: env_required("GOOGLE_API_KEY")?,
                model: env_or("GOOGLE_MODEL", DEFAULT_GOOGLE_MODEL),
                base_url: env_or("GOOGLE_BASE_URL", DEFAULT_GOOGLE_BASE_URL),
                enable_search_grounding: env_bool("ENABLE_SEARCH_GROUNDING", true)?,
                enable_url_grounding: env_bool("ENABLE_URL_GROUNDING", true)?,
            }),
        };

        let batch_size = match overrides.batch_size {
            Some(n) => n,
            None => env_parse("BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
        };
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BATCH_SIZE",
                value: "0".to_string(),
                message: "batch size must be at least 1".to_string(),
            });
        }

        let delay_seconds = match overrides.delay_seconds {
            Some(n) => n,
            None => env_parse("RATE_LIMIT_DELAY_SECONDS", DEFAULT_DELAY_SECONDS)?,
        };

        let (data_dir, input_filename) = match &overrides.input {
            Some(path) => split_input_path(path),
            None => (
                PathBuf::from(env_or("DATA_DIR", ".")),
                env_or("INPUT_FILENAME", DEFAULT_INPUT_FILENAME),
            ),
        };

        let output_dir = overrides
            .output_dir
            .clone()
            .or_else(|| env_opt("OUTPUT_DIR").map(PathBuf::from))
            .unwrap_or_else(|| data_dir.clone());

        let output_filename = env_opt("OUTPUT_FILENAME").unwrap_or_else(|| {
            format!(
                "validated_pharmacies_{}.csv",
                Local::now().format("%Y%m%d_%H%M%S")
            )
        });

        Ok(Self {
            backend,
            batch_size,
            batch_delay: Duration::from_secs(delay_seconds),
            max_output_tokens: env_parse("MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS)?,
            data_dir,
            input_filename,
            output_dir,
            output_filename,
        })
    }

    pub fn input_path(&self) -> PathBuf {
        self.data_dir.join(&self.input_filename)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_filename)
    }
}

fn split_input_path(path: &Path) -> (PathBuf, String) {
    let dir = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => PathBuf::from("."),
        Some(p) => p.to_path_buf(),
        None => PathBuf::from("."),
    };
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, file)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_required(key: &'static str) -> Result<String, ConfigError> {
    env_opt(key).ok_or(ConfigError::MissingKey(key))
}

fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: raw,
            message: e.to_string(),
        }),
    }
}

fn env_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env_opt(key) {
        None => Ok(default),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key,
                value: raw,
                message: "expected true or false".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_known_names() {
        assert_eq!(ProviderKind::parse("openai").unwrap(), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::parse("Google").unwrap(), ProviderKind::Google);
        assert_eq!(ProviderKind::parse(" openai ").unwrap(), ProviderKind::OpenAi);
    }

    #[test]
    fn provider_kind_rejects_unknown_names() {
        let err = ProviderKind::parse("azure").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(ref n) if n == "azure"));
    }

    #[test]
    fn unknown_provider_fails_before_credential_lookup() {
        let overrides = ConfigOverrides {
            provider: Some("anthropic".to_string()),
            ..Default::default()
        };
        let err = AppConfig::load(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(_)));
    }

    #[test]
    fn split_input_path_handles_bare_filename() {
        let (dir, file) = split_input_path(Path::new("pharmacies.csv"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(file, "pharmacies.csv");
    }

    #[test]
    fn split_input_path_handles_nested_path() {
        let (dir, file) = split_input_path(Path::new("data/in/pharmacies.csv"));
        assert_eq!(dir, PathBuf::from("data/in"));
        assert_eq!(file, "pharmacies.csv");
    }

    #[test]
    fn backend_label_embeds_model() {
        let backend = BackendConfig::OpenAi(OpenAiConfig {
            api_key: "sk-test".to_string(),
            model: "o3-deep-research".to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        });
        assert_eq!(backend.label(), "OpenAI o3-deep-research");
    }
}
