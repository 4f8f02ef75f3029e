//! Verdict types, reply parsing, and fallback synthesis.
//!
//! The oracle's reply is free text expected to embed exactly one JSON
//! object shaped `{"validations": [...]}`. Extraction slices from the
//! first `{` to the last `}` and decodes the slice; anything else is a
//! parse failure handled by whole-batch fallback synthesis upstream.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::error::ProviderError;

/// Oracle-reported confidence, with `error` reserved for adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
    /// Synthesized by the adapter when the backend call or the reply parse
    /// failed. Never requested from the oracle.
    Error,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Error => "error",
        }
    }

    /// Loose parse of the oracle's confidence string. Unrecognized labels
    /// degrade to `low` rather than poisoning the verdict.
    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "low" => Confidence::Low,
            other => {
                warn!(label = other, "unrecognized confidence label, treating as low");
                Confidence::Low
            }
        }
    }
}

/// One structured judgment about one record's claimed states.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// 1-based position within the batch, as echoed (or invented) by the
    /// oracle. Kept signed and unclamped so the merge step can bound-check
    /// whatever came back.
    pub record_index: i64,
    /// `None` is "oracle could not tell", distinct from adapter failure.
    pub is_correct: Option<bool>,
    /// Replacement states text; empty unless the claim was judged wrong.
    pub corrected_states: String,
    pub confidence: Confidence,
    pub reasoning: String,
}

#[derive(Deserialize)]
struct ValidationSheet {
    #[serde(default)]
    validations: Vec<Value>,
}

impl Verdict {
    /// Convert one entry of the `validations` array. Entries without a
    /// usable integer `pharmacy_index`, or with the wrong JSON types in
    /// other fields, are dropped individually rather than failing the
    /// whole reply.
    fn from_value(entry: &Value) -> Option<Self> {
        let record_index = entry.get("pharmacy_index").and_then(Value::as_i64)?;
        Some(Self {
            record_index,
            is_correct: entry.get("is_correct").and_then(Value::as_bool),
            corrected_states: entry
                .get("corrected_states")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            confidence: entry
                .get("confidence")
                .and_then(Value::as_str)
                .map(Confidence::parse)
                .unwrap_or(Confidence::Low),
            reasoning: entry
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Slice the reply between the first `{` and the last `}`, inclusive.
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Decode the oracle reply into verdicts.
///
/// The returned list may be shorter than the batch, longer, or carry
/// out-of-range indices; the orchestrator owns those checks. Only a
/// missing/undecodable JSON object is an error here.
pub fn parse_reply(raw: &str) -> Result<Vec<Verdict>, ProviderError> {
    let json_str = extract_json(raw).ok_or_else(|| {
        ProviderError::parse("no JSON object found in reply".to_string())
    })?;

    let sheet: ValidationSheet = serde_json::from_str(json_str)
        .map_err(|e| ProviderError::parse(format!("invalid JSON in reply: {e}")))?;

    let mut verdicts = Vec::with_capacity(sheet.validations.len());
    for entry in &sheet.validations {
        match Verdict::from_value(entry) {
            Some(v) => verdicts.push(v),
            None => warn!(%entry, "dropping validation entry without usable pharmacy_index"),
        }
    }
    Ok(verdicts)
}

/// Synthesize the whole-batch fallback: exactly `batch_len` verdicts with
/// indices `1..=batch_len`, null correctness, and error confidence.
pub fn fallback_verdicts(batch_len: usize, reason: &str) -> Vec<Verdict> {
    (1..=batch_len as i64)
        .map(|index| Verdict {
            record_index: index,
            is_correct: None,
            corrected_states: String::new(),
            confidence: Confidence::Error,
            reasoning: reason.to_string(),
        })
        .collect()
}

/// Adapter output: either verdicts parsed from a real reply, or the
/// synthesized fallback with the failure reason attached.
///
/// A typed variant instead of a bare `Vec` so call sites cannot mistake a
/// failed batch for a quiet one.
#[derive(Debug)]
pub enum BatchOutcome {
    Parsed(Vec<Verdict>),
    Fallback { verdicts: Vec<Verdict>, reason: String },
}

impl BatchOutcome {
    pub fn verdicts(&self) -> &[Verdict] {
        match self {
            BatchOutcome::Parsed(v) => v,
            BatchOutcome::Fallback { verdicts, .. } => verdicts,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, BatchOutcome::Fallback { .. })
    }

    /// The whole-batch failure reason, when this outcome is a fallback.
    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            BatchOutcome::Parsed(_) => None,
            BatchOutcome::Fallback { reason, .. } => Some(reason),
        }
    }
}
