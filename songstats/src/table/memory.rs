//! In-memory table store
//!
//! Holds the grid as display strings, the way a spreadsheet shows them.
//! Counts requests so callers can assert on write behavior, and can be told
//! to fail writes or to change a cell behind a reader's back.

use super::{CellWrite, TableSnapshot, TableStore};
use crate::error::TableError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Grid {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Table store backed by a vector of rows
#[derive(Debug, Default)]
pub struct InMemoryTable {
    grid: Mutex<Grid>,
    batch_writes: AtomicUsize,
    columns_appended: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryTable {
    pub fn new(header: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            grid: Mutex::new(Grid {
                header: header.iter().map(|s| s.to_string()).collect(),
                rows: rows
                    .iter()
                    .map(|r| r.iter().map(|s| s.to_string()).collect())
                    .collect(),
            }),
            ..Default::default()
        }
    }

    /// Current grid contents
    pub async fn snapshot(&self) -> TableSnapshot {
        let grid = self.grid.lock().await;
        TableSnapshot {
            header: grid.header.clone(),
            rows: grid.rows.clone(),
        }
    }

    /// Cell by data row and column name; empty when absent
    pub async fn cell(&self, row_index: usize, column: &str) -> String {
        let grid = self.grid.lock().await;
        grid.header
            .iter()
            .position(|h| h == column)
            .and_then(|c| grid.rows.get(row_index).and_then(|r| r.get(c)))
            .cloned()
            .unwrap_or_default()
    }

    /// Overwrite a cell directly, as another editor would
    pub async fn set_cell(&self, row_index: usize, column: &str, value: &str) {
        let mut grid = self.grid.lock().await;
        let Some(c) = grid.header.iter().position(|h| h == column) else {
            return;
        };
        if let Some(row) = grid.rows.get_mut(row_index) {
            if row.len() <= c {
                row.resize(c + 1, String::new());
            }
            row[c] = value.to_string();
        }
    }

    /// Number of successful `write_cells` calls
    pub fn batch_writes(&self) -> usize {
        self.batch_writes.load(Ordering::SeqCst)
    }

    /// Number of successful `append_column` calls
    pub fn columns_appended(&self) -> usize {
        self.columns_appended.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), TableError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TableError::Network("simulated read failure".into()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), TableError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TableError::Api {
                status: 503,
                message: "simulated write failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for InMemoryTable {
    async fn read_all(&self) -> Result<TableSnapshot, TableError> {
        self.check_reads()?;
        Ok(self.snapshot().await)
    }

    async fn read_header(&self) -> Result<Vec<String>, TableError> {
        self.check_reads()?;
        Ok(self.grid.lock().await.header.clone())
    }

    async fn read_row(&self, row_index: usize) -> Result<Vec<String>, TableError> {
        self.check_reads()?;
        let grid = self.grid.lock().await;
        grid.rows
            .get(row_index)
            .cloned()
            .ok_or_else(|| TableError::OutOfRange(format!("row {}", row_index)))
    }

    async fn append_column(&self, name: &str) -> Result<usize, TableError> {
        self.check_writes()?;
        let mut grid = self.grid.lock().await;
        grid.header.push(name.to_string());
        self.columns_appended.fetch_add(1, Ordering::SeqCst);
        Ok(grid.header.len() - 1)
    }

    async fn write_cells(&self, row_index: usize, cells: &[CellWrite]) -> Result<(), TableError> {
        self.check_writes()?;
        let mut grid = self.grid.lock().await;
        let width = grid.header.len();

        if let Some(bad) = cells.iter().find(|c| c.column >= width) {
            return Err(TableError::OutOfRange(format!("column {}", bad.column)));
        }
        let row = grid
            .rows
            .get_mut(row_index)
            .ok_or_else(|| TableError::OutOfRange(format!("row {}", row_index)))?;

        for cell in cells {
            if row.len() <= cell.column {
                row.resize(cell.column + 1, String::new());
            }
            row[cell.column] = cell.value.to_cell();
        }
        self.batch_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
