//! Destination table
//!
//! The table is a header row followed by data rows. Rows are addressed by
//! zero-based data row index (the header is not counted); columns by
//! zero-based position in the header.
//!
//! [`TableStore`] is the seam between table sync and the backing store:
//! [`SheetsClient`] for Google Sheets, [`InMemoryTable`] for tests and dry
//! runs against fixtures.

pub mod memory;
pub mod sheets_client;
pub mod sync;

use crate::error::TableError;
use crate::fields::{ARTIST_NAME, SONG_TITLE};
use crate::types::FieldValue;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub use memory::InMemoryTable;
pub use sheets_client::SheetsClient;
pub use sync::{TableSync, WriteOutcome};

/// Columns every input table must have
pub const REQUIRED_COLUMNS: [&str; 2] = [ARTIST_NAME, SONG_TITLE];

/// Whole-table read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSnapshot {
    pub header: Vec<String>,
    /// Data rows; may be shorter than the header (trailing blanks omitted)
    pub rows: Vec<Vec<String>>,
}

impl TableSnapshot {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        column_index(&self.header, name)
    }

    /// Required columns absent from the header
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| self.column_index(c).is_none())
            .collect()
    }

    pub fn row(&self, row_index: usize) -> Option<RowSnapshot> {
        self.rows
            .get(row_index)
            .map(|cells| RowSnapshot::new(row_index, &self.header, cells))
    }
}

/// Position of a column in a header row
pub fn column_index(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h.trim() == name)
}

/// One row's cells keyed by column name, as read at the start of the run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSnapshot {
    pub row_index: usize,
    cells: BTreeMap<String, String>,
}

impl RowSnapshot {
    pub fn new(row_index: usize, header: &[String], cells: &[String]) -> Self {
        let cells = header
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.trim().is_empty())
            .map(|(i, name)| {
                (
                    name.trim().to_string(),
                    cells.get(i).cloned().unwrap_or_default(),
                )
            })
            .collect();
        Self { row_index, cells }
    }

    /// Cell value; empty when the column does not exist
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

/// One cell of a batched row write
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub column: usize,
    pub value: FieldValue,
}

/// Backing store for the destination table
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Read header and all data rows
    async fn read_all(&self) -> Result<TableSnapshot, TableError>;

    /// Read the live header row
    async fn read_header(&self) -> Result<Vec<String>, TableError>;

    /// Read one live data row
    async fn read_row(&self, row_index: usize) -> Result<Vec<String>, TableError>;

    /// Write `name` into the first free header cell, growing the grid if
    /// needed; returns the new column's position
    ///
    /// Callers check for an existing column first; the store does not.
    async fn append_column(&self, name: &str) -> Result<usize, TableError>;

    /// Write all cells of one row in a single request
    async fn write_cells(&self, row_index: usize, cells: &[CellWrite]) -> Result<(), TableError>;
}

/// Spreadsheet column letter for a zero-based position (0 → A, 26 → AA)
pub fn column_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (column % 26) as u8);
        if column < 26 {
            break;
        }
        column = column / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// One-based sheet row number of a data row
pub fn sheet_row_number(row_index: usize) -> usize {
    row_index + 2
}
