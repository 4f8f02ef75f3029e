//! Prompt construction for validation batches.
//!
//! One fixed instructional template shared by every backend, with optional
//! backend-specific suffixes (Gemini search strategy, reference URLs)
//! appended after the record listing. The required output shape never
//! changes per backend.

use std::fmt::Write;

use crate::dataset::PharmacyRecord;

/// Rendered for any field the input row does not carry.
pub const PLACEHOLDER: &str = "N/A";

/// System message sent alongside the batch prompt on role-tagged backends.
pub const SYSTEM_PROMPT: &str = "You are a healthcare regulatory expert. \
Provide accurate, fact-based analysis of pharmacy licensing and operations.";

const PREAMBLE: &str = r#"You are a healthcare regulatory expert specializing in pharmacy licensing and operations across U.S. states.

Your task is to verify if the listed "states of operation" for each mail-order pharmacy are accurate based on current regulatory information, licensing requirements, and known operational status.

CRITICAL: Use web search to find current, authoritative information about each pharmacy's licensing and operational status.

For each pharmacy, search and analyze:
1. **Current licensing databases**: Search state pharmacy board websites and licensing databases
2. **Regulatory compliance**: Check for current mail-order pharmacy licenses in claimed states
3. **Company websites**: Verify operational scope on official pharmacy websites
4. **Recent regulatory changes**: Look for any recent licensing updates or restrictions
5. **Cross-reference sources**: Compare multiple authoritative sources for accuracy

IMPORTANT: Base your analysis on factual, up-to-date regulatory information found through web search, not assumptions or outdated knowledge.

Pharmacies to validate:
"#;

const OUTPUT_SHAPE: &str = r#"

For each pharmacy, provide your response in this EXACT JSON format:
{
  "validations": [
    {
      "pharmacy_index": 1,
      "is_correct": true/false,
      "corrected_states": "Only provide if different from original - use same format as input",
      "confidence": "high/medium/low",
      "reasoning": "Brief explanation of your findings"
    }
  ]
}

Only include "corrected_states" if the original information is incorrect. Use the same format as the input (e.g., "Nationwide", "State1, State2, State3", or "All states except State1").
"#;

const SEARCH_SUFFIX_HEADER: &str = "

SEARCH STRATEGY (Use Google Search to find current information):
";

const SEARCH_SUFFIX: &str = r#"
- Search for "[pharmacy name] licensing states" to find current operational scope
- Search for "[pharmacy name] pharmacy board license" for official records
- Search for "mail order pharmacy licensing [state name]" for state-specific requirements
"#;

const URL_SUFFIX: &str = r#"
- Reference specific state pharmacy board websites:
  * "[state].gov pharmacy board" or "[state] board of pharmacy"
  * NABP (National Association of Boards of Pharmacy) database
  * State-specific pharmacy licensing verification portals

- Key regulatory websites to check:
  * https://www.nabp.pharmacy/ (National database)
  * State pharmacy board websites for license verification
  * FDA registered mail-order pharmacy databases
"#;

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(PLACEHOLDER)
}

/// Render the shared batch prompt: preamble, 1-based numbered record
/// listing, and the required output shape. Deterministic for a given batch.
pub fn render_batch_prompt(batch: &[PharmacyRecord]) -> String {
    let mut prompt = String::from(PREAMBLE);
    for (i, pharmacy) in batch.iter().enumerate() {
        // Positions are 1-based; the oracle echoes them back as
        // `pharmacy_index` and the merge step depends on that convention.
        // write! into a String is infallible.
        let _ = write!(
            prompt,
            "\n{index}. Pharmacy: {name}\n   Address: {address}, {city}, {state} {zip}\n   Current listed states of operation: {states}\n   NCPDP ID: {ncpdp}\n",
            index = i + 1,
            name = field(&pharmacy.store_name),
            address = field(&pharmacy.address1),
            city = field(&pharmacy.city),
            state = field(&pharmacy.state),
            zip = field(&pharmacy.zip_code),
            states = field(&pharmacy.operates_in_states),
            ncpdp = field(&pharmacy.ncpdp_id),
        );
    }
    prompt.push_str(OUTPUT_SHAPE);
    prompt
}

/// Gemini-only grounding directives, appended after the base prompt.
/// Returns `None` when both toggles are off.
pub fn grounding_suffix(enable_search: bool, enable_url_grounding: bool) -> Option<String> {
    if !enable_search && !enable_url_grounding {
        return None;
    }
    let mut suffix = String::from(SEARCH_SUFFIX_HEADER);
    if enable_search {
        suffix.push_str(SEARCH_SUFFIX);
    }
    if enable_url_grounding {
        suffix.push_str(URL_SUFFIX);
    }
    Some(suffix)
}
