//! Run workflow
//!
//! Drives enrichment over the destination table, one row at a time:
//!
//! ```text
//! Run:  Idle → Running → Completed | Aborted
//! Row:  Pending → Enriching → Syncing → Done | Failed
//!       Pending → Skipped (no artist or title)
//! ```
//!
//! A run aborts only when the destination cannot be read at startup, the
//! header lacks `artist_name`/`song_title`, or the run is cancelled. Every
//! other failure is confined to its row.

pub mod pipeline;
pub mod statistics;

use crate::types::{Outcome, Source};
use serde::Serialize;
use uuid::Uuid;

pub use pipeline::{Pipeline, PipelineConfig};
pub use statistics::{FailedRow, RunSummary, SourceStats};

/// Run lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Row lifecycle within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowState {
    Pending,
    Enriching,
    Syncing,
    Done,
    Failed,
    Skipped,
}

/// Progress events emitted during a run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// Table read and validated; rows about to be processed
    RunStarted {
        run_id: Uuid,
        /// Rows at or after the start row
        total_rows: usize,
    },

    /// A row moved to a new state
    RowState {
        row_index: usize,
        state: RowState,
        /// Failure or skip reason for terminal states
        detail: Option<String>,
    },

    /// One source finished for a row
    SourceOutcome {
        row_index: usize,
        source: Source,
        outcome: Outcome,
    },

    /// Run reached a terminal state
    RunFinished { run_id: Uuid, state: RunState },
}
