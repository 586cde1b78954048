//! Source Adapters
//!
//! One adapter per external data source. Each wraps a provider API behind
//! the same two calls:
//! - `search` - free-text query → ranked candidates
//! - `fetch` - resolved identity → field map (or nothing)
//!
//! [`lookup`] composes them with the [`IdentityResolver`] and never fails:
//! every error becomes an [`Outcome`](crate::types::Outcome) value inside
//! the returned [`SourceResult`].
//!
//! # Adapters
//! 1. **spotify_client** - catalog metadata and audio features
//! 2. **youtube_client** - video view counts
//! 3. **genius_client** - lyrics (API search + page scrape)
//! 4. **lyrics_cleaner** - scraped lyrics → cleaned text
//!
//! # Rate limiting
//! Each adapter owns a token bucket sized from `[sources.<name>]` and waits
//! for a permit before every provider request rather than failing.

pub mod genius_client;
pub mod lyrics_cleaner;
pub mod spotify_client;
pub mod youtube_client;

use crate::error::{FatalError, SourceFailure};
use crate::fusion::identity_cache::IdentityCache;
use crate::fusion::identity_resolver::{IdentityResolver, Resolution};
use crate::types::{CandidateMatch, CanonicalIdentity, FieldMap, SongQuery, Source, SourceResult};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use songstats_common::config::TieBreak;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

pub use genius_client::GeniusClient;
pub use spotify_client::SpotifyClient;
pub use youtube_client::YouTubeClient;

/// User-Agent sent to every provider
pub const USER_AGENT: &str = concat!("songstats/", env!("CARGO_PKG_VERSION"));

/// Connection timeout for provider requests
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Token bucket limiting one adapter's request rate
pub type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Per-second token bucket (a rate of zero is treated as one)
pub fn per_second_limiter(requests_per_second: u32) -> DirectRateLimiter {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rate))
}

/// Per-minute token bucket (a rate of zero is treated as one)
pub fn per_minute_limiter(requests_per_minute: u32) -> DirectRateLimiter {
    let rate = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_minute(rate))
}

/// HTTP client with bounded total and connect timeouts
pub fn build_http_client(timeout: Duration) -> Result<Client, FatalError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FatalError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Check a provider response and return its body on success
pub(crate) async fn read_success_body(response: reqwest::Response) -> Result<String, SourceFailure> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(SourceFailure::from_status(status, &body))
    }
}

/// Parse a JSON body into a provider response type
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    body: &str,
) -> Result<T, SourceFailure> {
    serde_json::from_str(body)
        .map_err(|e| SourceFailure::Parse(format!("{} response: {}", provider, e)))
}

/// External data source behind a uniform search/fetch contract
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source kind this adapter serves
    fn source(&self) -> Source;

    /// Default tie-break policy for this source's candidates
    fn tie_break(&self) -> TieBreak {
        TieBreak::Reject
    }

    /// Search the provider for candidates, most relevant first
    async fn search(&self, query: &SongQuery) -> Result<Vec<CandidateMatch>, SourceFailure>;

    /// Fetch fields for a resolved identity
    ///
    /// `Ok(None)` means the provider knows the identity but holds no data
    /// for it (e.g. a video without public statistics).
    async fn fetch(
        &self,
        identity: &CanonicalIdentity,
        query: &SongQuery,
    ) -> Result<Option<FieldMap>, SourceFailure>;
}

/// Resolve and fetch one source for one query
///
/// Never fails. Search errors and fetch errors become `SourceError`, an
/// empty search becomes `NotFound`, a withheld resolution becomes
/// `AmbiguousMatch` with no fields.
pub async fn lookup(
    adapter: &dyn SourceAdapter,
    resolver: &IdentityResolver,
    cache: Option<&IdentityCache>,
    query: &SongQuery,
) -> SourceResult {
    let source = adapter.source();

    let identity = match cache.and_then(|c| c.get(source, query)) {
        Some(identity) => {
            debug!(source = %source, row = query.row_index, id = %identity.external_id, "Identity cache hit");
            identity
        }
        None => {
            let candidates = match adapter.search(query).await {
                Ok(candidates) => candidates,
                Err(e) => return SourceResult::error(source, e),
            };

            match resolver.resolve(source, query, &candidates) {
                Resolution::Matched(identity) => {
                    if let Some(cache) = cache {
                        cache.insert(query, identity.clone());
                    }
                    identity
                }
                Resolution::NoMatch => return SourceResult::not_found(source),
                Resolution::Ambiguous { best, reason } => {
                    debug!(
                        source = %source,
                        row = query.row_index,
                        best = %best.external_id,
                        confidence = best.match_confidence,
                        reason = ?reason,
                        "Match withheld"
                    );
                    return SourceResult::ambiguous(source, Some(best));
                }
            }
        }
    };

    match adapter.fetch(&identity, query).await {
        Ok(Some(fields)) => SourceResult::found(identity, fields),
        Ok(None) => SourceResult::not_found(source),
        Err(e) => SourceResult::error(source, e),
    }
}
