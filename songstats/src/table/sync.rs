//! Table Sync
//!
//! Turns an [`EnrichedRow`] into the minimal set of cell writes for that row
//! and applies them.
//!
//! # Per-row sequence
//! 1. **Plan** (pure): apply each field's write policy and drop values the
//!    snapshot already holds
//! 2. **Staleness check**: re-read the live row; if a planned cell or the
//!    row's artist/title changed since the snapshot, write nothing
//! 3. **Schema extension**: add missing columns, one at a time under the
//!    run-wide schema lock
//! 4. **Write**: all cells in one batch request
//!
//! Failures affect the row only and are returned as
//! [`WriteOutcome::Failed`].

use super::{column_index, CellWrite, RowSnapshot, TableStore};
use crate::error::SyncError;
use crate::fields::{field_spec, is_blank_cell, ARTIST_NAME, SONG_TITLE};
use crate::types::{EnrichedRow, FieldValue};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One planned cell update
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    pub column: String,
    pub value: FieldValue,
}

/// Result of syncing one row
#[derive(Debug)]
pub enum WriteOutcome {
    /// Destination already holds every produced value
    Unchanged,
    /// Dry run: these writes would have been made
    Planned {
        writes: Vec<PlannedWrite>,
        new_columns: Vec<String>,
    },
    /// Writes applied
    Written {
        cells: usize,
        columns_added: Vec<String>,
    },
    /// Nothing written for this row
    Failed(SyncError),
}

/// Compute the writes for one row
///
/// Pure: depends only on the row, the snapshot and the header.
/// - `Null` values are never written
/// - fill-only fields are written only into blank cells
/// - fields whose column is absent are written only if their policy may
///   create the column
/// - values equal to the snapshot cell are dropped
pub fn plan(row: &EnrichedRow, snapshot: &RowSnapshot, header: &[String]) -> Vec<PlannedWrite> {
    let mut writes = Vec::new();

    for (name, value) in &row.fields {
        let Some(spec) = field_spec(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        let exists = column_index(header, name).is_some();
        if !exists && !spec.policy.creates_column() {
            continue;
        }

        let current = if exists { snapshot.get(name) } else { "" };
        if spec.policy.fill_only() && !is_blank_cell(current) {
            continue;
        }
        if value.matches_cell(current) {
            continue;
        }

        writes.push(PlannedWrite {
            column: name.clone(),
            value: value.clone(),
        });
    }

    writes
}

/// Sole writer of the destination table for a run
pub struct TableSync {
    store: Arc<dyn TableStore>,
    /// Known header; the lock also serializes schema changes for the run
    header: Mutex<Vec<String>>,
    dry_run: bool,
}

impl TableSync {
    pub fn new(store: Arc<dyn TableStore>, header: Vec<String>) -> Self {
        Self {
            store,
            header: Mutex::new(header),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Current known header
    pub async fn header(&self) -> Vec<String> {
        self.header.lock().await.clone()
    }

    /// Position of `name`, appending the column if it does not exist yet
    ///
    /// Returns the position and whether this call added the column. The live
    /// header is re-read under the schema lock before appending, so calling
    /// this twice with the same name yields one column.
    pub async fn ensure_column(&self, name: &str) -> Result<(usize, bool), SyncError> {
        let mut header = self.header.lock().await;
        if let Some(i) = column_index(&header, name) {
            return Ok((i, false));
        }

        let schema_err = |source| SyncError::Schema {
            column: name.to_string(),
            source,
        };

        *header = self.store.read_header().await.map_err(schema_err)?;
        if let Some(i) = column_index(&header, name) {
            return Ok((i, false));
        }

        let position = self.store.append_column(name).await.map_err(schema_err)?;
        if header.len() <= position {
            header.resize(position, String::new());
            header.push(name.to_string());
        } else {
            header[position] = name.to_string();
        }

        info!(column = %name, position, "Added column");
        Ok((position, true))
    }

    /// Plan and apply the writes for one row
    pub async fn sync(&self, row: &EnrichedRow, snapshot: &RowSnapshot) -> WriteOutcome {
        let header = self.header().await;
        let writes = plan(row, snapshot, &header);
        if writes.is_empty() {
            debug!(row = row.row_index, "Row unchanged");
            return WriteOutcome::Unchanged;
        }

        let new_columns: Vec<String> = writes
            .iter()
            .filter(|w| column_index(&header, &w.column).is_none())
            .map(|w| w.column.clone())
            .collect();

        if self.dry_run {
            return WriteOutcome::Planned {
                writes,
                new_columns,
            };
        }

        if let Err(e) = self.check_stale(row.row_index, snapshot, &header, &writes).await {
            warn!(row = row.row_index, error = %e, "Skipping row write");
            return WriteOutcome::Failed(e);
        }

        let mut cells = Vec::with_capacity(writes.len());
        let mut columns_added = Vec::new();
        for write in &writes {
            let column = match self.ensure_column(&write.column).await {
                Ok((column, added)) => {
                    if added {
                        columns_added.push(write.column.clone());
                    }
                    column
                }
                Err(e) => return WriteOutcome::Failed(e),
            };
            cells.push(CellWrite {
                column,
                value: write.value.clone(),
            });
        }

        if let Err(e) = self.store.write_cells(row.row_index, &cells).await {
            return WriteOutcome::Failed(SyncError::Write(e));
        }

        debug!(row = row.row_index, cells = cells.len(), "Row written");
        WriteOutcome::Written {
            cells: cells.len(),
            columns_added,
        }
    }

    /// Fail if the live row no longer matches the snapshot
    async fn check_stale(
        &self,
        row_index: usize,
        snapshot: &RowSnapshot,
        header: &[String],
        writes: &[PlannedWrite],
    ) -> Result<(), SyncError> {
        let live = self
            .store
            .read_row(row_index)
            .await
            .map_err(SyncError::Write)?;

        let columns = [ARTIST_NAME, SONG_TITLE]
            .into_iter()
            .chain(writes.iter().map(|w| w.column.as_str()));

        for column in columns {
            let Some(i) = column_index(header, column) else {
                continue;
            };
            let live_value = live.get(i).map(String::as_str).unwrap_or("");
            if live_value.trim() != snapshot.get(column).trim() {
                return Err(SyncError::StaleSnapshot {
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}
