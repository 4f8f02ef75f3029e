//! The tabular store: CSV in, enriched CSV out.
//!
//! The dataset is held fully in memory as a header row plus string rows.
//! Original columns are never mutated; the four output columns are appended
//! once at the start of a run and overwritten in place as verdicts merge.
//! Persistence is a full-file overwrite of the output path.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::provider::Verdict;

/// The column the whole exercise is about. Its absence is fatal at load.
pub const REQUIRED_COLUMN: &str = "Operates in states";

const COL_STORE_NAME: &str = "StoreName";
const COL_ADDRESS1: &str = "Address1";
const COL_CITY: &str = "City";
const COL_STATE: &str = "State";
const COL_ZIP: &str = "ZipCode";
const COL_NCPDP_ID: &str = "NCPDPID";

const OUT_CORRECT: &str = "Initial states of operation correct";
const OUT_CONFIDENCE: &str = "Validation confidence";
const OUT_REASONING: &str = "Validation reasoning";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("required column '{REQUIRED_COLUMN}' not found (available columns: {available})")]
    MissingRequiredColumn { available: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// One input row projected onto the fields the prompt interpolates.
/// Missing columns and empty cells both surface as `None`.
#[derive(Debug, Clone, Default)]
pub struct PharmacyRecord {
    pub store_name: Option<String>,
    pub address1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub operates_in_states: Option<String>,
    pub ncpdp_id: Option<String>,
}

/// Column indices of the four appended output columns.
#[derive(Debug, Clone, Copy)]
pub struct OutputColumns {
    pub correct: usize,
    pub corrected: usize,
    pub confidence: usize,
    pub reasoning: usize,
}

/// Run-end tallies over the correctness column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerdictCounts {
    pub correct: usize,
    pub incorrect: usize,
    pub unresolved: usize,
}

/// In-memory pharmacy dataset.
#[derive(Debug, Clone)]
pub struct PharmacyTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl PharmacyTable {
    /// Load a CSV and verify the schema carries the required column.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let path_display = path.display().to_string();
        let mut reader = csv::Reader::from_path(path).map_err(|source| DatasetError::Read {
            path: path_display.clone(),
            source,
        })?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|source| DatasetError::Read {
                path: path_display.clone(),
                source,
            })?
            .iter()
            .map(|h| h.to_string())
            .collect();

        if !headers.iter().any(|h| h == REQUIRED_COLUMN) {
            return Err(DatasetError::MissingRequiredColumn {
                available: headers.join(", "),
            });
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| DatasetError::Read {
                path: path_display.clone(),
                source,
            })?;
            let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            // Ragged rows are padded so positional writes stay in bounds.
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        info!(
            rows = rows.len(),
            columns = headers.len(),
            path = %path_display,
            "loaded input dataset"
        );
        Ok(Self { headers, rows })
    }

    /// Build a table directly from headers and rows. Test constructor.
    pub fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn cell(&self, row: usize, column: &str) -> Option<String> {
        let idx = self.column_index(column)?;
        let value = self.rows.get(row)?.get(idx)?;
        if value.trim().is_empty() {
            None
        } else {
            Some(value.clone())
        }
    }

    /// Project one row into the adapter's input shape.
    pub fn record(&self, row: usize) -> PharmacyRecord {
        PharmacyRecord {
            store_name: self.cell(row, COL_STORE_NAME),
            address1: self.cell(row, COL_ADDRESS1),
            city: self.cell(row, COL_CITY),
            state: self.cell(row, COL_STATE),
            zip_code: self.cell(row, COL_ZIP),
            operates_in_states: self.cell(row, REQUIRED_COLUMN),
            ncpdp_id: self.cell(row, COL_NCPDP_ID),
        }
    }

    /// Append the four output columns, initialized empty, and return their
    /// indices. The corrected-states column name embeds the provider label.
    pub fn append_output_columns(&mut self, provider_label: &str) -> OutputColumns {
        let base = self.headers.len();
        self.headers.push(OUT_CORRECT.to_string());
        self.headers
            .push(format!("States of operation by {provider_label}"));
        self.headers.push(OUT_CONFIDENCE.to_string());
        self.headers.push(OUT_REASONING.to_string());
        for row in &mut self.rows {
            row.resize(self.headers.len(), String::new());
        }
        OutputColumns {
            correct: base,
            corrected: base + 1,
            confidence: base + 2,
            reasoning: base + 3,
        }
    }

    /// Overwrite the four output cells of one row with a verdict.
    pub fn apply_verdict(&mut self, row: usize, columns: &OutputColumns, verdict: &Verdict) {
        let Some(cells) = self.rows.get_mut(row) else {
            return;
        };
        cells[columns.correct] = match verdict.is_correct {
            Some(true) => "true".to_string(),
            Some(false) => "false".to_string(),
            None => String::new(),
        };
        cells[columns.corrected] = verdict.corrected_states.clone();
        cells[columns.confidence] = verdict.confidence.as_str().to_string();
        cells[columns.reasoning] = verdict.reasoning.clone();
    }

    /// Tally the correctness column for the run summary.
    pub fn verdict_counts(&self, columns: &OutputColumns) -> VerdictCounts {
        let mut counts = VerdictCounts {
            correct: 0,
            incorrect: 0,
            unresolved: 0,
        };
        for row in &self.rows {
            match row.get(columns.correct).map(String::as_str) {
                Some("true") => counts.correct += 1,
                Some("false") => counts.incorrect += 1,
                _ => counts.unresolved += 1,
            }
        }
        counts
    }

    /// Persist the whole table to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        let display = path.display().to_string();
        let mut writer = csv::Writer::from_path(path).map_err(|source| DatasetError::Write {
            path: display.clone(),
            source,
        })?;
        writer
            .write_record(&self.headers)
            .and_then(|_| {
                for row in &self.rows {
                    writer.write_record(row)?;
                }
                writer.flush().map_err(csv::Error::from)
            })
            .map_err(|source| DatasetError::Write {
                path: display,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Confidence, Verdict};

    fn sample_table() -> PharmacyTable {
        PharmacyTable::from_parts(
            vec![
                "StoreName".to_string(),
                "Address1".to_string(),
                "City".to_string(),
                "State".to_string(),
                "ZipCode".to_string(),
                REQUIRED_COLUMN.to_string(),
                "NCPDPID".to_string(),
            ],
            vec![
                vec![
                    "Acme Rx".to_string(),
                    "1 Elm St".to_string(),
                    "Reno".to_string(),
                    "NV".to_string(),
                    "89501".to_string(),
                    "Nationwide".to_string(),
                    "7654321".to_string(),
                ],
                vec![
                    "Budget Meds".to_string(),
                    String::new(),
                    "Austin".to_string(),
                    "TX".to_string(),
                    "73301".to_string(),
                    "TX, OK".to_string(),
                    String::new(),
                ],
            ],
        )
    }

    fn verdict(index: i64, is_correct: Option<bool>) -> Verdict {
        Verdict {
            record_index: index,
            is_correct,
            corrected_states: "CA only".to_string(),
            confidence: Confidence::High,
            reasoning: "board records".to_string(),
        }
    }

    #[test]
    fn record_projection_treats_empty_cells_as_missing() {
        let table = sample_table();
        let rec = table.record(1);
        assert_eq!(rec.store_name.as_deref(), Some("Budget Meds"));
        assert!(rec.address1.is_none());
        assert!(rec.ncpdp_id.is_none());
        assert_eq!(rec.operates_in_states.as_deref(), Some("TX, OK"));
    }

    #[test]
    fn append_adds_four_empty_columns_after_originals() {
        let mut table = sample_table();
        let original_width = table.headers().len();
        let cols = table.append_output_columns("OpenAI o3-deep-research");

        assert_eq!(table.headers().len(), original_width + 4);
        assert_eq!(cols.correct, original_width);
        assert_eq!(
            table.headers()[cols.corrected],
            "States of operation by OpenAI o3-deep-research"
        );
        let counts = table.verdict_counts(&cols);
        assert_eq!(counts.unresolved, 2);
    }

    #[test]
    fn apply_verdict_overwrites_and_is_idempotent() {
        let mut table = sample_table();
        let cols = table.append_output_columns("Google gemini-2.5-pro");
        let v = verdict(1, Some(false));

        table.apply_verdict(0, &cols, &v);
        let first = table.clone();
        table.apply_verdict(0, &cols, &v);
        assert_eq!(table.rows, first.rows);

        let counts = table.verdict_counts(&cols);
        assert_eq!(counts.incorrect, 1);
        assert_eq!(counts.unresolved, 1);
    }

    #[test]
    fn null_correctness_counts_as_unresolved() {
        let mut table = sample_table();
        let cols = table.append_output_columns("x");
        table.apply_verdict(0, &cols, &verdict(1, None));
        let counts = table.verdict_counts(&cols);
        assert_eq!(counts.correct, 0);
        assert_eq!(counts.unresolved, 2);
    }

    #[test]
    fn save_and_load_round_trip_preserves_rows_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut table = sample_table();
        let cols = table.append_output_columns("OpenAI o3-deep-research");
        table.apply_verdict(0, &cols, &verdict(1, Some(true)));
        table.save(&path).unwrap();

        let reloaded = PharmacyTable::load(&path).unwrap();
        assert_eq!(reloaded.len(), table.len());
        assert_eq!(reloaded.headers(), table.headers());
        assert_eq!(reloaded.cell(0, OUT_CONFIDENCE).as_deref(), Some("high"));
        assert_eq!(reloaded.cell(1, OUT_CONFIDENCE), None);
    }

    #[test]
    fn load_rejects_missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "StoreName,City\nAcme,Reno\n").unwrap();

        let err = PharmacyTable::load(&path).unwrap_err();
        match err {
            DatasetError::MissingRequiredColumn { available } => {
                assert!(available.contains("StoreName"));
            }
            other => panic!("expected MissingRequiredColumn, got {other:?}"),
        }
    }
}
