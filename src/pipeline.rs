//! Batch orchestrator: partition, dispatch, merge, checkpoint, pace.
//!
//! Strictly sequential. Each batch goes through the provider exactly once
//! (no retries); verdicts merge back by position; the whole dataset is
//! persisted after every batch that merged anything, so an interrupted run
//! keeps results through its last completed batch. A restart runs from
//! batch 0 against a fresh output file; partial runs are not resumable.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::dataset::{DatasetError, PharmacyRecord, PharmacyTable, VerdictCounts};
use crate::provider::ValidationProvider;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Only the final save is fatal; mid-run checkpoint failures are
    /// logged and the loop continues.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Run-level outcome counts for reporting.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unresolved: usize,
    pub batches: usize,
    /// Batches that came back as whole-batch fallback (backend or parse
    /// failure).
    pub fallback_batches: usize,
    pub merged_verdicts: usize,
    pub discarded_verdicts: usize,
}

impl RunSummary {
    /// Share of rows that ended with a definite true/false verdict.
    pub fn resolved_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.correct + self.incorrect) as f64 / self.total as f64
    }
}

/// Map an oracle-supplied 1-based within-batch index to an absolute row.
///
/// Indices outside `1..=batch_len` are rejected so a malformed index can
/// never write into another batch's rows.
fn absolute_row(batch_start: usize, record_index: i64, batch_len: usize) -> Option<usize> {
    if record_index < 1 || record_index > batch_len as i64 {
        return None;
    }
    batch_start.checked_add(record_index as usize - 1)
}

/// Drive the full dataset through the provider and persist the enriched
/// table at `config.output_path()`.
pub async fn run_validation(
    provider: &dyn ValidationProvider,
    table: &mut PharmacyTable,
    config: &AppConfig,
) -> Result<RunSummary, PipelineError> {
    let columns = table.append_output_columns(&provider.label());
    let total = table.len();
    let batch_size = config.batch_size;
    let batch_count = total.div_ceil(batch_size.max(1));
    let output_path = config.output_path();

    info!(
        total,
        batch_size,
        batches = batch_count,
        provider = provider.name(),
        output = %output_path.display(),
        "starting validation run"
    );

    let mut fallback_batches = 0usize;
    let mut merged_verdicts = 0usize;
    let mut discarded_verdicts = 0usize;

    for batch_no in 0..batch_count {
        let start = batch_no * batch_size;
        let end = (start + batch_size).min(total);
        let records: Vec<PharmacyRecord> = (start..end).map(|i| table.record(i)).collect();

        let outcome = provider.validate_batch(&records).await;
        if let Some(reason) = outcome.fallback_reason() {
            warn!(
                batch = batch_no + 1,
                reason, "batch fell back to error verdicts"
            );
            fallback_batches += 1;
        }

        let mut merged_in_batch = 0usize;
        for verdict in outcome.verdicts() {
            match absolute_row(start, verdict.record_index, records.len()) {
                Some(row) => {
                    table.apply_verdict(row, &columns, verdict);
                    merged_in_batch += 1;
                }
                None => {
                    warn!(
                        batch = batch_no + 1,
                        record_index = verdict.record_index,
                        "discarding verdict with out-of-range index"
                    );
                    discarded_verdicts += 1;
                }
            }
        }
        merged_verdicts += merged_in_batch;

        info!(
            batch = batch_no + 1,
            batches = batch_count,
            merged = merged_in_batch,
            "batch complete"
        );

        // Crash-recovery checkpoint: best effort mid-run.
        if merged_in_batch > 0 {
            match table.save(&output_path) {
                Ok(()) => debug!(batch = batch_no + 1, "checkpoint saved"),
                Err(e) => warn!(batch = batch_no + 1, error = %e, "checkpoint save failed, continuing"),
            }
        }

        if end < total {
            debug!(delay = ?config.batch_delay, "pausing before next batch");
            tokio::time::sleep(config.batch_delay).await;
        }
    }

    // Final persistence is not best-effort.
    table.save(&output_path)?;

    let counts = table.verdict_counts(&columns);
    let summary = summarize(
        total,
        counts,
        batch_count,
        fallback_batches,
        merged_verdicts,
        discarded_verdicts,
    );
    log_summary(&summary, &output_path);
    Ok(summary)
}

fn summarize(
    total: usize,
    counts: VerdictCounts,
    batches: usize,
    fallback_batches: usize,
    merged_verdicts: usize,
    discarded_verdicts: usize,
) -> RunSummary {
    RunSummary {
        total,
        correct: counts.correct,
        incorrect: counts.incorrect,
        unresolved: counts.unresolved,
        batches,
        fallback_batches,
        merged_verdicts,
        discarded_verdicts,
    }
}

fn log_summary(summary: &RunSummary, output_path: &Path) {
    info!(
        total = summary.total,
        correct = summary.correct,
        incorrect = summary.incorrect,
        unresolved = summary.unresolved,
        fallback_batches = summary.fallback_batches,
        discarded = summary.discarded_verdicts,
        resolved_rate = format!("{:.1}%", summary.resolved_rate() * 100.0),
        output = %output_path.display(),
        "validation run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_count_is_ceiling_division() {
        for (total, size, expected) in [(0usize, 30usize, 0usize), (1, 30, 1), (30, 30, 1), (31, 30, 2), (90, 30, 3), (7, 3, 3)] {
            assert_eq!(total.div_ceil(size), expected, "total={total} size={size}");
        }
    }

    #[test]
    fn absolute_row_maps_one_based_indices() {
        assert_eq!(absolute_row(0, 1, 10), Some(0));
        assert_eq!(absolute_row(30, 1, 30), Some(30));
        assert_eq!(absolute_row(30, 30, 30), Some(59));
    }

    #[test]
    fn absolute_row_rejects_out_of_range_indices() {
        assert_eq!(absolute_row(0, 0, 10), None);
        assert_eq!(absolute_row(0, -3, 10), None);
        // A short final batch must not accept indices past its own length.
        assert_eq!(absolute_row(90, 11, 10), None);
        assert_eq!(absolute_row(0, 11, 10), None);
    }

    #[test]
    fn resolved_rate_handles_empty_dataset() {
        let summary = summarize(
            0,
            VerdictCounts {
                correct: 0,
                incorrect: 0,
                unresolved: 0,
            },
            0,
            0,
            0,
            0,
        );
        assert_eq!(summary.resolved_rate(), 0.0);
    }
}
