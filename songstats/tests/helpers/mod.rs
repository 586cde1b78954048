//! Shared test helpers
//!
//! Scripted source adapters, table builders and log capture for the
//! integration tests. No network access.

#![allow(dead_code)]

pub mod log_capture;

use async_trait::async_trait;
use songstats::extractors::SourceAdapter;
use songstats::fusion::{ResolverPolicy, RowEnricher};
use songstats::table::InMemoryTable;
use songstats::types::{CandidateMatch, CanonicalIdentity, FieldMap, FieldValue, SongQuery, Source};
use songstats::SourceFailure;
use songstats_common::config::TieBreak;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use log_capture::{capture_logs, LogCapture};

/// Header used by most tests
pub const SONGS_HEADER: [&str; 2] = ["artist_name", "song_title"];

/// Edit applied to the table while a lookup is in flight
struct ConcurrentEdit {
    table: Arc<InMemoryTable>,
    row_index: usize,
    column: String,
    value: String,
}

/// Source adapter answering from a script
///
/// Every query gets the same candidates and the same fields, which is
/// enough for single-song scenarios and for tables of identical rows.
pub struct FakeAdapter {
    source: Source,
    tie_break: TieBreak,
    candidates: Vec<CandidateMatch>,
    search_error: Option<SourceFailure>,
    fields: Option<FieldMap>,
    delay: Option<Duration>,
    edit: Option<ConcurrentEdit>,
    searches: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeAdapter {
    /// Adapter whose search returns nothing
    pub fn new(source: Source) -> Self {
        Self {
            source,
            tie_break: TieBreak::Reject,
            candidates: Vec::new(),
            search_error: None,
            fields: None,
            delay: None,
            edit: None,
            searches: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Append a candidate; provider rank follows insertion order
    pub fn with_candidate(mut self, external_id: &str, title: &str, artist: &str) -> Self {
        let provider_rank = self.candidates.len();
        self.candidates.push(CandidateMatch {
            external_id: external_id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            provider_rank,
        });
        self
    }

    /// Fields returned by `fetch`
    pub fn with_fields(mut self, fields: &[(&str, FieldValue)]) -> Self {
        self.fields = Some(
            fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        );
        self
    }

    /// Make every search fail
    pub fn failing(mut self, failure: SourceFailure) -> Self {
        self.search_error = Some(failure);
        self
    }

    /// Sleep before answering a search
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Change a cell of `table` during `fetch`, as another editor would
    pub fn with_concurrent_edit(
        mut self,
        table: Arc<InMemoryTable>,
        row_index: usize,
        column: &str,
        value: &str,
    ) -> Self {
        self.edit = Some(ConcurrentEdit {
            table,
            row_index,
            column: column.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for FakeAdapter {
    fn source(&self) -> Source {
        self.source
    }

    fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    async fn search(&self, _query: &SongQuery) -> Result<Vec<CandidateMatch>, SourceFailure> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.search_error {
            Some(failure) => Err(failure.clone()),
            None => Ok(self.candidates.clone()),
        }
    }

    async fn fetch(
        &self,
        _identity: &CanonicalIdentity,
        _query: &SongQuery,
    ) -> Result<Option<FieldMap>, SourceFailure> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(edit) = &self.edit {
            edit.table.set_cell(edit.row_index, &edit.column, &edit.value).await;
        }
        Ok(self.fields.clone())
    }
}

/// Enricher over the given adapters with default policies
pub fn enricher(adapters: Vec<Arc<FakeAdapter>>) -> RowEnricher {
    enricher_with_timeout(adapters, Duration::from_secs(5))
}

pub fn enricher_with_timeout(adapters: Vec<Arc<FakeAdapter>>, timeout: Duration) -> RowEnricher {
    adapters.into_iter().fold(RowEnricher::new(), |enricher, adapter| {
        let policy = ResolverPolicy {
            tie_break: adapter.tie_break(),
            ..ResolverPolicy::default()
        };
        enricher.with_adapter(adapter, policy, timeout)
    })
}

/// Table with the required header and the given (artist, title) rows
pub fn songs_table(rows: &[(&str, &str)]) -> Arc<InMemoryTable> {
    let rows: Vec<[&str; 2]> = rows.iter().map(|(a, t)| [*a, *t]).collect();
    let rows: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
    Arc::new(InMemoryTable::new(&SONGS_HEADER, &rows))
}

pub fn query(row_index: usize, artist: &str, title: &str) -> SongQuery {
    SongQuery::from_cells(row_index, artist, title, None).expect("artist and title are set")
}

// ============================================================================
// Scenario fixtures
// ============================================================================

/// Catalog adapter knowing Weezer's "Island In The Sun"
pub fn weezer_catalog() -> FakeAdapter {
    FakeAdapter::new(Source::Catalog)
        .with_candidate("2MLHyLy5z5l5YRp7momlgw", "Island In The Sun", "Weezer")
        .with_candidate("0pQskrTITgmCMyr85tb9qq", "Island In The Sun - Live", "Weezer")
        .with_fields(&[
            ("track_id", FieldValue::Text("2MLHyLy5z5l5YRp7momlgw".into())),
            ("song_popularity", FieldValue::Integer(78)),
            ("duration", FieldValue::Integer(200)),
            ("tempo_spotify", FieldValue::Float(118.0)),
            ("energy", FieldValue::Float(0.65)),
            ("danceability", FieldValue::Float(0.53)),
            ("artist_id", FieldValue::Text("3jOstUTkEu2JkjvRdBA5Gu".into())),
            ("year", FieldValue::Integer(2001)),
            ("genres", FieldValue::Text("alternative rock, rock".into())),
        ])
}

/// Views adapter with an official video for the Weezer song
pub fn weezer_views() -> FakeAdapter {
    FakeAdapter::new(Source::VideoViews)
        .with_tie_break(TieBreak::ProviderRank)
        .with_candidate("erG5K_RmoDA", "Island In The Sun", "Weezer")
        .with_fields(&[
            ("youtube_views", FieldValue::Integer(152_000_000)),
            ("youtube_video_id", FieldValue::Text("erG5K_RmoDA".into())),
        ])
}

/// Lyrics adapter with cleaned lyrics for the Weezer song
pub fn weezer_lyrics() -> FakeAdapter {
    FakeAdapter::new(Source::Lyrics)
        .with_candidate("1", "Island in the Sun", "Weezer")
        .with_fields(&[
            ("lyrics", FieldValue::Text("Hip hip\nWhen you're on a holiday".into())),
            (
                "genius_url",
                FieldValue::Text("https://genius.com/Weezer-island-in-the-sun-lyrics".into()),
            ),
        ])
}
