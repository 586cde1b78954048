//! Pipeline Driver
//!
//! Reads the destination table once, then enriches and syncs each row from
//! the start offset in order.
//!
//! # Error Handling
//! - Startup: an unreadable table or a header without `artist_name` /
//!   `song_title` aborts the run with a [`FatalError`]
//! - Per row: source failures are recorded as outcomes; sync failures mark
//!   the row `Failed` and the run continues
//! - Cancellation: checked between rows and raced against enrichment; a
//!   row already syncing is finished first, so every row ends either fully
//!   written or untouched
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::new(enricher, store, PipelineConfig::default())
//!     .with_cancellation(token);
//! let summary = pipeline.run().await?;
//! println!("{}", summary.display_string());
//! ```

use super::{RowState, RunEvent, RunState, RunSummary};
use crate::error::FatalError;
use crate::fields::{ARTIST_NAME, COVER, SONG_TITLE};
use crate::fusion::RowEnricher;
use crate::table::{sheet_row_number, TableStore, TableSync, WriteOutcome};
use crate::types::{Source, SongQuery};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sources to consult for every row
    pub sources: Vec<Source>,
    /// First data row to process (zero-based, header excluded)
    pub start_row: usize,
    /// Plan writes without applying them
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: Source::ALL.to_vec(),
            start_row: 0,
            dry_run: false,
        }
    }
}

/// Row-by-row enrichment driver
pub struct Pipeline {
    enricher: Arc<RowEnricher>,
    store: Arc<dyn TableStore>,
    config: PipelineConfig,
    event_tx: Option<mpsc::Sender<RunEvent>>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(enricher: Arc<RowEnricher>, store: Arc<dyn TableStore>, config: PipelineConfig) -> Self {
        Self {
            enricher,
            store,
            config,
            event_tx: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Report progress on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<RunEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Stop the run when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run to completion
    ///
    /// Returns the summary for completed and cancelled runs alike (the
    /// summary's `state` tells them apart); startup failures are errors.
    pub async fn run(&self) -> Result<RunSummary, FatalError> {
        let mut summary = RunSummary::new(self.config.dry_run);
        summary.state = RunState::Running;

        let snapshot = self.store.read_all().await.map_err(|e| {
            warn!(error = %e, "Destination table unavailable");
            FatalError::DestinationUnavailable(e)
        })?;

        let missing = snapshot.missing_required();
        if !missing.is_empty() {
            return Err(FatalError::MissingColumns(missing.join(", ")));
        }

        let column = |name: &str| snapshot.column_index(name);
        let (Some(artist_col), Some(title_col)) = (column(ARTIST_NAME), column(SONG_TITLE)) else {
            return Err(FatalError::MissingColumns(format!("{}, {}", ARTIST_NAME, SONG_TITLE)));
        };
        let cover_col = column(COVER);

        let sync = TableSync::new(Arc::clone(&self.store), snapshot.header.clone())
            .with_dry_run(self.config.dry_run);

        let start = self.config.start_row.min(snapshot.rows.len());
        summary.rows_total = snapshot.rows.len() - start;

        info!(
            run_id = %summary.run_id,
            rows = summary.rows_total,
            start_row = self.config.start_row,
            sources = ?self.config.sources,
            dry_run = self.config.dry_run,
            "Starting enrichment run"
        );
        self.emit(RunEvent::RunStarted {
            run_id: summary.run_id,
            total_rows: summary.rows_total,
        })
        .await;

        let mut state = RunState::Completed;

        for row_index in start..snapshot.rows.len() {
            if self.cancel.is_cancelled() {
                state = RunState::Aborted;
                break;
            }

            let Some(row_snapshot) = snapshot.row(row_index) else {
                continue;
            };
            self.emit_row(row_index, RowState::Pending, None).await;

            let cells = &snapshot.rows[row_index];
            let cell = |i: usize| cells.get(i).map(String::as_str).unwrap_or("");
            let query = SongQuery::from_cells(
                row_index,
                cell(artist_col),
                cell(title_col),
                cover_col.map(cell),
            );

            let Some(query) = query else {
                debug!(row = row_index, "Missing artist or title");
                summary.rows_skipped += 1;
                self.emit_row(row_index, RowState::Skipped, Some("missing artist or title".into()))
                    .await;
                continue;
            };

            self.emit_row(row_index, RowState::Enriching, None).await;
            let enriched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(row = row_index, "Cancelled during enrichment; row left untouched");
                    state = RunState::Aborted;
                    break;
                }
                row = self.enricher.enrich(&query, &self.config.sources) => row,
            };

            summary.record_outcomes(&enriched);
            for (source, outcome) in &enriched.per_source_status {
                self.emit(RunEvent::SourceOutcome {
                    row_index,
                    source: *source,
                    outcome: outcome.clone(),
                })
                .await;
            }

            self.emit_row(row_index, RowState::Syncing, None).await;
            let (row_state, detail) = match sync.sync(&enriched, &row_snapshot).await {
                WriteOutcome::Unchanged => {
                    summary.rows_done += 1;
                    summary.rows_unchanged += 1;
                    (RowState::Done, None)
                }
                WriteOutcome::Planned { writes, new_columns } => {
                    summary.rows_done += 1;
                    summary.cells_planned += writes.len();
                    for column in new_columns {
                        if !summary.columns_added.contains(&column) {
                            summary.columns_added.push(column);
                        }
                    }
                    let planned: Vec<_> = writes.iter().map(|w| w.column.as_str()).collect();
                    info!(row = row_index, columns = ?planned, "Dry run: would write");
                    (RowState::Done, None)
                }
                WriteOutcome::Written {
                    cells,
                    columns_added,
                } => {
                    summary.rows_done += 1;
                    summary.cells_written += cells;
                    summary.columns_added.extend(columns_added);
                    (RowState::Done, None)
                }
                WriteOutcome::Failed(e) => {
                    let reason = e.to_string();
                    summary.record_failed(row_index, sheet_row_number(row_index), reason.clone());
                    (RowState::Failed, Some(reason))
                }
            };

            info!(
                row = row_index,
                artist = %query.artist,
                title = %query.title,
                state = ?row_state,
                "Row finished"
            );
            self.emit_row(row_index, row_state, detail).await;
        }

        summary.finish(state);
        self.emit(RunEvent::RunFinished {
            run_id: summary.run_id,
            state,
        })
        .await;

        info!(
            run_id = %summary.run_id,
            state = ?state,
            done = summary.rows_done,
            failed = summary.rows_failed,
            skipped = summary.rows_skipped,
            "Enrichment run finished"
        );
        Ok(summary)
    }

    async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    async fn emit_row(&self, row_index: usize, state: RowState, detail: Option<String>) {
        self.emit(RunEvent::RowState {
            row_index,
            state,
            detail,
        })
        .await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::InMemoryTable;

    #[tokio::test]
    async fn test_unreadable_table_is_fatal() {
        let store = Arc::new(InMemoryTable::new(&["artist_name", "song_title"], &[]));
        store.set_fail_reads(true);
        let pipeline = Pipeline::new(Arc::new(RowEnricher::new()), store, PipelineConfig::default());

        assert!(matches!(
            pipeline.run().await,
            Err(FatalError::DestinationUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_header_is_fatal() {
        let store = Arc::new(InMemoryTable::new(&["artist", "title"], &[&["Weezer", "Buddy Holly"]]));
        let pipeline = Pipeline::new(Arc::new(RowEnricher::new()), store, PipelineConfig::default());

        match pipeline.run().await {
            Err(FatalError::MissingColumns(cols)) => assert_eq!(cols, "artist_name, song_title"),
            other => panic!("expected missing columns, got {:?}", other.map(|s| s.state)),
        }
    }

    #[tokio::test]
    async fn test_blank_rows_are_skipped() {
        let store = Arc::new(InMemoryTable::new(
            &["artist_name", "song_title"],
            &[&["", "Untitled"], &["Weezer", ""]],
        ));
        let pipeline = Pipeline::new(
            Arc::new(RowEnricher::new()),
            store,
            PipelineConfig {
                sources: vec![],
                ..Default::default()
            },
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.rows_skipped, 2);
        assert_eq!(summary.rows_processed(), 2);
    }

    #[tokio::test]
    async fn test_start_row_past_end_processes_nothing() {
        let store = Arc::new(InMemoryTable::new(
            &["artist_name", "song_title"],
            &[&["Weezer", "Buddy Holly"]],
        ));
        let pipeline = Pipeline::new(
            Arc::new(RowEnricher::new()),
            store,
            PipelineConfig {
                start_row: 10,
                ..Default::default()
            },
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.rows_total, 0);
        assert_eq!(summary.state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_aborts() {
        let store = Arc::new(InMemoryTable::new(
            &["artist_name", "song_title"],
            &[&["Weezer", "Buddy Holly"]],
        ));
        let token = CancellationToken::new();
        token.cancel();
        let pipeline = Pipeline::new(Arc::new(RowEnricher::new()), store.clone(), PipelineConfig::default())
            .with_cancellation(token);

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.state, RunState::Aborted);
        assert_eq!(summary.rows_processed(), 0);
        assert_eq!(store.batch_writes(), 0);
    }
}
