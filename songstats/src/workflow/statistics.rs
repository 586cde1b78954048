//! Run statistics
//!
//! Aggregated over a run and written as the final summary (log line and
//! optional JSON file).

use super::RunState;
use crate::types::{EnrichedRow, Outcome, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use songstats_common::human_time::format_elapsed;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Outcome counts for one source
///
/// Display: "N found, N not found, N ambiguous, N skipped, N errors"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub found: usize,
    pub not_found: usize,
    pub ambiguous: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SourceStats {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Found => self.found += 1,
            Outcome::NotFound => self.not_found += 1,
            Outcome::AmbiguousMatch => self.ambiguous += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::SourceError(_) => self.errors += 1,
        }
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} found, {} not found, {} ambiguous, {} skipped, {} errors",
            self.found, self.not_found, self.ambiguous, self.skipped, self.errors
        )
    }
}

/// A row that ended in `Failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRow {
    /// Zero-based data row index (usable as `--start-row`)
    pub row_index: usize,
    /// One-based row number as shown by the spreadsheet
    pub sheet_row: usize,
    pub reason: String,
}

/// Whole-run summary
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: RunState,
    pub dry_run: bool,
    /// Rows at or after the start row
    pub rows_total: usize,
    /// Rows that finished `Done`, including unchanged ones
    pub rows_done: usize,
    /// Done rows that needed no writes
    pub rows_unchanged: usize,
    pub rows_failed: usize,
    /// Rows without artist or title
    pub rows_skipped: usize,
    pub cells_written: usize,
    /// Dry run only: cells that would have been written
    pub cells_planned: usize,
    pub columns_added: Vec<String>,
    pub sources: BTreeMap<Source, SourceStats>,
    pub failed_rows: Vec<FailedRow>,
    /// Zero-based indexes of rows where a source errored; re-run candidates
    pub source_error_rows: Vec<usize>,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            state: RunState::Idle,
            dry_run,
            rows_total: 0,
            rows_done: 0,
            rows_unchanged: 0,
            rows_failed: 0,
            rows_skipped: 0,
            cells_written: 0,
            cells_planned: 0,
            columns_added: Vec::new(),
            sources: BTreeMap::new(),
            failed_rows: Vec::new(),
            source_error_rows: Vec::new(),
        }
    }

    /// Count each source's outcome for one row
    pub fn record_outcomes(&mut self, row: &EnrichedRow) {
        for (source, outcome) in &row.per_source_status {
            self.sources.entry(*source).or_default().record(outcome);
        }
        if row.has_source_error() {
            self.source_error_rows.push(row.row_index);
        }
    }

    pub fn record_failed(&mut self, row_index: usize, sheet_row: usize, reason: String) {
        self.rows_failed += 1;
        self.failed_rows.push(FailedRow {
            row_index,
            sheet_row,
            reason,
        });
    }

    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    /// Rows processed to a terminal state
    pub fn rows_processed(&self) -> usize {
        self.rows_done + self.rows_failed + self.rows_skipped
    }

    pub fn elapsed(&self) -> std::time::Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    /// Multi-line human-readable summary
    pub fn display_string(&self) -> String {
        let mut lines = vec![format!(
            "Run {} {:?} in {}: {} of {} rows processed ({} done, {} unchanged, {} failed, {} skipped)",
            self.run_id,
            self.state,
            format_elapsed(self.elapsed()),
            self.rows_processed(),
            self.rows_total,
            self.rows_done,
            self.rows_unchanged,
            self.rows_failed,
            self.rows_skipped,
        )];

        if self.dry_run {
            lines.push(format!("Dry run: {} cells would be written", self.cells_planned));
        } else {
            lines.push(format!("{} cells written", self.cells_written));
        }
        if !self.columns_added.is_empty() {
            lines.push(format!("Columns added: {}", self.columns_added.join(", ")));
        }
        for (source, stats) in &self.sources {
            lines.push(format!("  {} ({}): {}", source, source.provider(), stats.display_string()));
        }
        for failed in &self.failed_rows {
            lines.push(format!("  row {} failed: {}", failed.sheet_row, failed.reason));
        }
        if let Some(first) = self.source_error_rows.first() {
            lines.push(format!(
                "{} row(s) had source errors; re-run with --start-row {}",
                self.source_error_rows.len(),
                first
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceFailure;

    #[test]
    fn test_source_stats_display() {
        let mut stats = SourceStats::default();
        stats.record(&Outcome::Found);
        stats.record(&Outcome::Found);
        stats.record(&Outcome::SourceError(SourceFailure::Timeout));
        assert_eq!(
            stats.display_string(),
            "2 found, 0 not found, 0 ambiguous, 0 skipped, 1 errors"
        );
    }

    #[test]
    fn test_record_outcomes_tracks_source_error_rows() {
        let mut summary = RunSummary::new(false);
        let mut row = EnrichedRow::new(7);
        row.per_source_status.insert(Source::Catalog, Outcome::Found);
        row.per_source_status
            .insert(Source::Lyrics, Outcome::SourceError(SourceFailure::Timeout));

        summary.record_outcomes(&row);

        assert_eq!(summary.sources[&Source::Catalog].found, 1);
        assert_eq!(summary.sources[&Source::Lyrics].errors, 1);
        assert_eq!(summary.source_error_rows, vec![7]);
        assert!(summary.display_string().contains("--start-row 7"));
    }

    #[test]
    fn test_summary_serializes_source_keys() {
        let mut summary = RunSummary::new(true);
        summary.sources.insert(Source::VideoViews, SourceStats::default());
        summary.finish(RunState::Completed);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["state"], "completed");
        assert!(json["sources"]["video_views"].is_object());
        assert!(json["finished_at"].is_string());
    }
}
