//! songstats library
//!
//! Enriches a spreadsheet of (artist, song) rows with catalog metadata,
//! video view counts and lyrics, writing the results back into the same
//! worksheet.
//!
//! # Layout
//! - [`extractors`] - source adapters (Spotify, YouTube, Genius)
//! - [`fusion`] - identity resolution and per-row merging
//! - [`table`] - destination store and per-row sync
//! - [`workflow`] - run driver, events and summary

pub mod config;
pub mod error;
pub mod extractors;
pub mod fields;
pub mod fusion;
pub mod table;
pub mod types;
pub mod workflow;

pub use error::{FatalError, SourceFailure, SyncError, TableError};
pub use types::{CanonicalIdentity, EnrichedRow, FieldValue, Outcome, SongQuery, Source, SourceResult};
