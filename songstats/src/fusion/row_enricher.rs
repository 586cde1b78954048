//! Row Enricher
//!
//! Runs the requested sources for one row concurrently, each under its own
//! timeout, and merges the results into an [`EnrichedRow`]. Only `Found`
//! results contribute fields; every other outcome is recorded and leaves
//! the row's existing cells alone.

use super::identity_cache::IdentityCache;
use super::identity_resolver::{IdentityResolver, ResolverPolicy};
use crate::error::SourceFailure;
use crate::extractors::{lookup, SourceAdapter};
use crate::fields::field_spec;
use crate::types::{EnrichedRow, Outcome, SongQuery, Source, SourceResult};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default outer timeout for one source lookup
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(20);

struct SourceSlot {
    adapter: Arc<dyn SourceAdapter>,
    resolver: IdentityResolver,
    timeout: Duration,
}

/// Per-row orchestrator over the configured source adapters
#[derive(Default)]
pub struct RowEnricher {
    slots: BTreeMap<Source, SourceSlot>,
    cache: Option<Arc<IdentityCache>>,
}

impl RowEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter with its resolution policy and lookup timeout
    ///
    /// A second adapter for the same source replaces the first.
    pub fn with_adapter(
        mut self,
        adapter: Arc<dyn SourceAdapter>,
        policy: ResolverPolicy,
        timeout: Duration,
    ) -> Self {
        let source = adapter.source();
        self.slots.insert(
            source,
            SourceSlot {
                adapter,
                resolver: IdentityResolver::new(policy),
                timeout,
            },
        );
        self
    }

    pub fn with_cache(mut self, cache: Arc<IdentityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sources with a registered adapter
    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.slots.keys().copied()
    }

    /// Enrich one row from the requested sources
    ///
    /// Never fails; per-source failures are recorded in
    /// `per_source_status`.
    pub async fn enrich(&self, query: &SongQuery, requested: &[Source]) -> EnrichedRow {
        let requested: BTreeSet<Source> = requested.iter().copied().collect();

        let lookups = requested.into_iter().map(|source| self.enrich_one(query, source));
        let results = join_all(lookups).await;

        merge(query.row_index, results)
    }

    async fn enrich_one(&self, query: &SongQuery, source: Source) -> SourceResult {
        if query.is_cover && source == Source::VideoViews {
            return SourceResult::skipped(source, "cover version");
        }

        let Some(slot) = self.slots.get(&source) else {
            return SourceResult::error(
                source,
                SourceFailure::Unavailable(format!("no {} adapter configured", source.provider())),
            );
        };

        let cache = self.cache.as_deref();
        match tokio::time::timeout(
            slot.timeout,
            lookup(slot.adapter.as_ref(), &slot.resolver, cache, query),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    row = query.row_index,
                    source = %source,
                    timeout_ms = slot.timeout.as_millis() as u64,
                    "Source lookup timed out"
                );
                SourceResult::error(source, SourceFailure::Timeout)
            }
        }
    }
}

/// Merge per-source results into one row
fn merge(row_index: usize, results: Vec<SourceResult>) -> EnrichedRow {
    let mut row = EnrichedRow::new(row_index);

    for result in results {
        let source = result.source;
        match &result.outcome {
            Outcome::Found => {
                for (name, value) in result.fields {
                    match field_spec(&name) {
                        Some(spec) if spec.source == source => {
                            row.fields.insert(name, value);
                        }
                        _ => warn!(
                            row = row_index,
                            source = %source,
                            field = %name,
                            "Dropping field not owned by source"
                        ),
                    }
                }
                if let Some(identity) = result.identity {
                    row.identities.insert(source, identity);
                }
                debug!(row = row_index, source = %source, "Source found");
            }
            Outcome::NotFound | Outcome::AmbiguousMatch | Outcome::Skipped(_) => {
                debug!(row = row_index, source = %source, outcome = %result.outcome, "No data from source");
            }
            Outcome::SourceError(e) => {
                warn!(row = row_index, source = %source, error = %e, "Source failed");
            }
        }
        row.per_source_status.insert(source, result.outcome);
    }

    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CanonicalIdentity, FieldMap, FieldValue};

    fn identity(source: Source) -> CanonicalIdentity {
        CanonicalIdentity {
            source,
            external_id: "id".into(),
            match_confidence: 1.0,
            matched_title: "t".into(),
            matched_artist: "a".into(),
        }
    }

    #[test]
    fn test_merge_takes_found_fields_only() {
        let found = SourceResult::found(
            identity(Source::Catalog),
            FieldMap::from([("track_id".to_string(), FieldValue::Text("t1".into()))]),
        );
        let ambiguous = SourceResult::ambiguous(Source::Lyrics, Some(identity(Source::Lyrics)));
        let failed = SourceResult::error(Source::VideoViews, SourceFailure::Timeout);

        let row = merge(4, vec![found, ambiguous, failed]);

        assert_eq!(row.row_index, 4);
        assert_eq!(row.fields.len(), 1);
        assert_eq!(row.outcome(Source::Lyrics), Some(&Outcome::AmbiguousMatch));
        assert!(row.has_source_error());
        assert!(row.identities.contains_key(&Source::Catalog));
        assert!(!row.identities.contains_key(&Source::Lyrics));
    }

    #[test]
    fn test_merge_drops_fields_of_other_sources() {
        let found = SourceResult::found(
            identity(Source::VideoViews),
            FieldMap::from([
                ("youtube_views".to_string(), FieldValue::Integer(10)),
                ("lyrics".to_string(), FieldValue::Text("nope".into())),
                ("made_up".to_string(), FieldValue::Integer(1)),
            ]),
        );
        let row = merge(0, vec![found]);
        assert_eq!(row.fields.keys().collect::<Vec<_>>(), vec!["youtube_views"]);
    }

    #[tokio::test]
    async fn test_missing_adapter_is_unavailable() {
        let enricher = RowEnricher::new();
        let query = SongQuery::from_cells(0, "Weezer", "Island In The Sun", None).unwrap();

        let row = enricher.enrich(&query, &[Source::Catalog]).await;
        assert!(matches!(
            row.outcome(Source::Catalog),
            Some(Outcome::SourceError(SourceFailure::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_cover_rows_skip_views() {
        let enricher = RowEnricher::new();
        let query = SongQuery::from_cells(0, "Weezer", "Island In The Sun", Some("x")).unwrap();

        let row = enricher.enrich(&query, &[Source::VideoViews]).await;
        assert!(matches!(row.outcome(Source::VideoViews), Some(Outcome::Skipped(_))));
        assert!(!row.has_source_error());
    }

    #[tokio::test]
    async fn test_duplicate_requests_run_once() {
        let enricher = RowEnricher::new();
        let query = SongQuery::from_cells(0, "Weezer", "Island In The Sun", None).unwrap();

        let row = enricher
            .enrich(&query, &[Source::Lyrics, Source::Lyrics])
            .await;
        assert_eq!(row.per_source_status.len(), 1);
    }
}
