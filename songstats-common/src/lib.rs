//! # SongStats Common Library
//!
//! Shared code for the SongStats workspace:
//! - Configuration loading (TOML + environment) and credential resolution
//! - Logging initialization
//! - Common error type
//! - Small formatting and file utilities

pub mod config;
pub mod error;
pub mod fs_util;
pub mod human_time;
pub mod logging;

pub use error::{Error, Result};
