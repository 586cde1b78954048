//! Core types shared by the enrichment pipeline
//!
//! Data flows through these types in order:
//! `SongQuery` → (`CandidateMatch`* → `CanonicalIdentity`) → `SourceResult`
//! → `EnrichedRow` → table sync.

use crate::error::SourceFailure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Sources
// ============================================================================

/// External data source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Music catalog with audio features (Spotify)
    Catalog,
    /// Video view counts (YouTube)
    VideoViews,
    /// Lyrics (Genius)
    Lyrics,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Catalog, Source::VideoViews, Source::Lyrics];

    /// Method name used on the command line
    pub fn method_name(self) -> &'static str {
        match self {
            Source::Catalog => "catalog",
            Source::VideoViews => "views",
            Source::Lyrics => "lyrics",
        }
    }

    /// Provider backing this source
    pub fn provider(self) -> &'static str {
        match self {
            Source::Catalog => "Spotify",
            Source::VideoViews => "YouTube",
            Source::Lyrics => "Genius",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

impl FromStr for Source {
    type Err = String;

    /// Accepts method names and the provider names used by older sheets
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "catalog" | "spotify" => Ok(Source::Catalog),
            "views" | "youtube" => Ok(Source::VideoViews),
            "lyrics" | "genius" => Ok(Source::Lyrics),
            other => Err(format!(
                "unknown method '{}' (expected catalog, views or lyrics)",
                other
            )),
        }
    }
}

// ============================================================================
// Queries and identities
// ============================================================================

/// One row's enrichment input
#[derive(Debug, Clone, PartialEq)]
pub struct SongQuery {
    pub artist: String,
    pub title: String,
    /// Zero-based data row index (header excluded)
    pub row_index: usize,
    /// Row is marked as a cover version
    pub is_cover: bool,
}

impl SongQuery {
    /// Build a query from raw cells; `None` when artist or title is blank
    pub fn from_cells(row_index: usize, artist: &str, title: &str, cover: Option<&str>) -> Option<Self> {
        let artist = artist.trim();
        let title = title.trim();
        if artist.is_empty() || title.is_empty() {
            return None;
        }
        Some(Self {
            artist: artist.to_string(),
            title: title.to_string(),
            row_index,
            is_cover: cover.map(|c| c.trim().eq_ignore_ascii_case("x")).unwrap_or(false),
        })
    }
}

/// Search hit returned by a source, before resolution
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    /// Provider identifier (track id, video id, song id)
    pub external_id: String,
    pub title: String,
    pub artist: String,
    /// Position in the provider's own ranking (0 = most relevant)
    pub provider_rank: usize,
}

/// Resolved identity of a query at one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalIdentity {
    pub source: Source,
    pub external_id: String,
    /// Resolver score (0.0-1.0)
    pub match_confidence: f64,
    pub matched_title: String,
    pub matched_artist: String,
}

// ============================================================================
// Field values
// ============================================================================

/// Scalar cell value produced by a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    /// Provider omitted the value; never written
    Null,
}

/// Field name → value
pub type FieldMap = BTreeMap<String, FieldValue>;

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Optional float rounded to `decimals` places
    pub fn rounded(value: Option<f64>, decimals: i32) -> Self {
        match value {
            Some(v) if v.is_finite() => {
                let factor = 10f64.powi(decimals);
                FieldValue::Float((v * factor).round() / factor)
            }
            _ => FieldValue::Null,
        }
    }

    /// Text form written to a cell
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Integer(v) => v.to_string(),
            FieldValue::Float(v) => v.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Null => String::new(),
        }
    }

    /// JSON form for APIs that accept typed cell values
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Integer(v) => serde_json::Value::from(*v),
            FieldValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Null => serde_json::Value::Null,
        }
    }

    /// Whether an existing cell already holds this value
    ///
    /// Numbers compare numerically so that display formatting (`1,234`,
    /// `0.530`) does not cause spurious rewrites. Text compares trimmed.
    pub fn matches_cell(&self, cell: &str) -> bool {
        let cell = cell.trim();
        match self {
            FieldValue::Integer(v) => parse_number(cell)
                .map(|c| (c - *v as f64).abs() < 0.5)
                .unwrap_or(false),
            FieldValue::Float(v) => parse_number(cell)
                .map(|c| (c - v).abs() <= 1e-9 * v.abs().max(1.0))
                .unwrap_or(false),
            FieldValue::Text(s) => s.trim() == cell,
            FieldValue::Null => cell.is_empty(),
        }
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return None;
    }
    cell.replace(',', "").parse::<f64>().ok()
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of one source for one row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// Identity resolved and data fetched
    Found,
    /// Source has no data for the query
    NotFound,
    /// Data withheld: low confidence or tied candidates
    AmbiguousMatch,
    /// Source deliberately not consulted for this row
    Skipped(String),
    /// Transport, auth, quota, timeout or parse failure
    SourceError(SourceFailure),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Found => "found",
            Outcome::NotFound => "not_found",
            Outcome::AmbiguousMatch => "ambiguous",
            Outcome::Skipped(_) => "skipped",
            Outcome::SourceError(_) => "source_error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            Outcome::SourceError(e) => write!(f, "source error ({})", e),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of one source lookup
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: Source,
    pub outcome: Outcome,
    /// Resolved identity (also set for low-confidence matches, for auditing)
    pub identity: Option<CanonicalIdentity>,
    /// Populated only when `outcome` is `Found`
    pub fields: FieldMap,
}

impl SourceResult {
    pub fn found(identity: CanonicalIdentity, fields: FieldMap) -> Self {
        Self {
            source: identity.source,
            outcome: Outcome::Found,
            identity: Some(identity),
            fields,
        }
    }

    pub fn not_found(source: Source) -> Self {
        Self::without_fields(source, Outcome::NotFound, None)
    }

    pub fn ambiguous(source: Source, identity: Option<CanonicalIdentity>) -> Self {
        Self::without_fields(source, Outcome::AmbiguousMatch, identity)
    }

    pub fn skipped(source: Source, reason: impl Into<String>) -> Self {
        Self::without_fields(source, Outcome::Skipped(reason.into()), None)
    }

    pub fn error(source: Source, failure: SourceFailure) -> Self {
        Self::without_fields(source, Outcome::SourceError(failure), None)
    }

    fn without_fields(source: Source, outcome: Outcome, identity: Option<CanonicalIdentity>) -> Self {
        Self {
            source,
            outcome,
            identity,
            fields: FieldMap::new(),
        }
    }
}

/// Merged enrichment for one row, held in memory until synced
#[derive(Debug, Clone, Default)]
pub struct EnrichedRow {
    pub row_index: usize,
    /// Fields from sources that reached `Found`
    pub fields: FieldMap,
    pub per_source_status: BTreeMap<Source, Outcome>,
    pub identities: BTreeMap<Source, CanonicalIdentity>,
}

impl EnrichedRow {
    pub fn new(row_index: usize) -> Self {
        Self {
            row_index,
            ..Default::default()
        }
    }

    /// True when any requested source failed with a provider error
    pub fn has_source_error(&self) -> bool {
        self.per_source_status
            .values()
            .any(|o| matches!(o, Outcome::SourceError(_)))
    }

    pub fn outcome(&self, source: Source) -> Option<&Outcome> {
        self.per_source_status.get(&source)
    }
}
