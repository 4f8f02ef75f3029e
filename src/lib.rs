#![forbid(unsafe_code)]

//! # statecheck
//!
//! Batch-validates the claimed "states of operation" of mail-order
//! pharmacies against an LLM oracle and merges the verdicts back into the
//! dataset as appended columns.
//!
//! The pipeline reads a CSV into an in-memory table, partitions the rows
//! into fixed-size batches, sends each batch to the configured provider
//! (OpenAI chat completions or Google Gemini with search grounding), parses
//! the JSON verdicts out of the free-form reply, merges them positionally,
//! and checkpoints the whole file after every productive batch so an
//! interrupted run keeps its completed work.
//!
//! Provider failures never abort a run: the adapter converts transport and
//! parse errors into error-confidence fallback verdicts, one per record in
//! the batch.

pub mod config;
pub mod dataset;
pub mod pipeline;
pub mod prompt;
pub mod provider;

pub use config::{AppConfig, BackendConfig, ConfigError, ProviderKind};
pub use dataset::{DatasetError, PharmacyRecord, PharmacyTable};
pub use pipeline::{run_validation, PipelineError, RunSummary};
pub use provider::{BatchOutcome, Confidence, ProviderError, ValidationProvider, Verdict};
