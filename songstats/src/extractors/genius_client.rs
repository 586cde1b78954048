// Genius client (lyrics source)
//
// Search: api.genius.com/search, song hits only
// Fetch: /songs/{id} for the page URL, then the page itself; lyrics live in
// `div[data-lyrics-container="true"]` blocks
//
// The API does not serve lyrics text, hence the page scrape.
//
// API Documentation: https://docs.genius.com

use super::lyrics_cleaner::clean_lyrics;
use super::{build_http_client, parse_json, per_second_limiter, read_success_body, DirectRateLimiter, SourceAdapter};
use crate::error::{FatalError, SourceFailure};
use crate::fields;
use crate::types::{CandidateMatch, CanonicalIdentity, FieldMap, FieldValue, SongQuery, Source};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;
use songstats_common::config::SourceConfig;
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://api.genius.com";

/// Default cell size limit; Google Sheets rejects cells over 50 000 characters
pub const DEFAULT_MAX_CELL_CHARS: usize = 50_000;

static LYRICS_CONTAINER: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"div[data-lyrics-container="true"]"#).expect("valid selector")
});

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "type")]
    kind: String,
    result: SongSummary,
}

#[derive(Debug, Deserialize)]
struct SongSummary {
    id: u64,
    title: String,
    primary_artist: PrimaryArtist,
}

#[derive(Debug, Deserialize)]
struct PrimaryArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SongBody {
    song: SongDetail,
}

#[derive(Debug, Deserialize)]
struct SongDetail {
    url: String,
}

/// Lyrics as scraped and as cleaned
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedLyrics {
    pub raw: String,
    pub cleaned: String,
}

/// Genius lyrics adapter
pub struct GeniusClient {
    client: Client,
    access_token: String,
    api_base: String,
    max_cell_chars: usize,
    rate_limiter: DirectRateLimiter,
}

impl GeniusClient {
    pub fn new(access_token: String, config: &SourceConfig) -> Result<Self, FatalError> {
        Ok(Self {
            client: build_http_client(Duration::from_secs(config.timeout_secs))?,
            access_token,
            api_base: API_BASE.to_string(),
            max_cell_chars: config.max_cell_chars.unwrap_or(DEFAULT_MAX_CELL_CHARS),
            rate_limiter: per_second_limiter(config.requests_per_second),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn api_get(&self, path: &str, query: &[(&str, String)]) -> Result<String, SourceFailure> {
        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;
        read_success_body(response).await
    }

    async fn page(&self, url: &str) -> Result<String, SourceFailure> {
        self.rate_limiter.until_ready().await;
        let response = self.client.get(url).send().await?;
        read_success_body(response).await
    }
}

#[async_trait]
impl SourceAdapter for GeniusClient {
    fn source(&self) -> Source {
        Source::Lyrics
    }

    async fn search(&self, query: &SongQuery) -> Result<Vec<CandidateMatch>, SourceFailure> {
        let q = format!("{} {}", query.artist, query.title);
        debug!(row = query.row_index, q = %q, "Genius search");

        let body = self.api_get("/search", &[("q", q)]).await?;
        let envelope: ApiEnvelope<SearchBody> = parse_json("Genius search", &body)?;
        Ok(candidates_from_hits(envelope.response.hits))
    }

    async fn fetch(
        &self,
        identity: &CanonicalIdentity,
        query: &SongQuery,
    ) -> Result<Option<FieldMap>, SourceFailure> {
        let body = self
            .api_get(&format!("/songs/{}", identity.external_id), &[])
            .await?;
        let envelope: ApiEnvelope<SongBody> = parse_json("Genius song", &body)?;
        let url = envelope.response.song.url;

        let html = self.page(&url).await?;
        let Some(lyrics) = scrape_lyrics(&html) else {
            debug!(url = %url, "No lyrics on page");
            return Ok(None);
        };
        debug!(
            url = %url,
            raw_chars = lyrics.raw.chars().count(),
            cleaned_chars = lyrics.cleaned.chars().count(),
            "Scraped lyrics"
        );

        let text = fit_to_cell(lyrics.cleaned, query, self.max_cell_chars);

        let mut map = FieldMap::new();
        map.insert(fields::LYRICS.to_string(), FieldValue::Text(text));
        map.insert(fields::GENIUS_URL.to_string(), FieldValue::Text(url));
        Ok(Some(map))
    }
}

fn candidates_from_hits(hits: Vec<Hit>) -> Vec<CandidateMatch> {
    hits.into_iter()
        .filter(|hit| hit.kind == "song")
        .enumerate()
        .map(|(rank, hit)| CandidateMatch {
            external_id: hit.result.id.to_string(),
            title: hit.result.title,
            artist: hit.result.primary_artist.name,
            provider_rank: rank,
        })
        .collect()
}

/// Extract lyrics from a song page; `None` when the page has none
pub fn scrape_lyrics(html: &str) -> Option<ScrapedLyrics> {
    let document = Html::parse_document(html);

    let blocks: Vec<String> = document
        .select(&LYRICS_CONTAINER)
        .map(|container| {
            let mut text = String::new();
            collect_text(container, &mut text);
            text
        })
        .collect();

    let raw = blocks.join("\n");
    if raw.trim().is_empty() {
        return None;
    }

    let cleaned = clean_lyrics(&raw);
    if cleaned.is_empty() {
        return None;
    }
    Some(ScrapedLyrics { raw, cleaned })
}

/// Text of an element with `<br>` as newlines, skipping excluded blocks
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            Node::Element(el) if el.attr("data-exclude-from-selection").is_some() => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

/// Replace lyrics too long for one cell with a notice
fn fit_to_cell(lyrics: String, query: &SongQuery, max_chars: usize) -> String {
    if lyrics.chars().count() <= max_chars {
        lyrics
    } else {
        format!(
            "{}: {}: lyrics exceed the {} character cell limit",
            query.artist, query.title, max_chars
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_preserves_line_breaks_and_skips_excluded() {
        let html = r#"<html><body>
            <div data-lyrics-container="true">[Chorus]<br>Hip hip<br><a href="/x"><span>Gone for the summer</span></a><div data-exclude-from-selection="true">You might also like</div></div>
            <div data-lyrics-container="true">We'll never feel bad anymore</div>
            <div class="footer">Embed</div>
        </body></html>"#;

        let lyrics = scrape_lyrics(html).unwrap();
        assert_eq!(
            lyrics.raw,
            "[Chorus]\nHip hip\nGone for the summer\nWe'll never feel bad anymore"
        );
        assert_eq!(
            lyrics.cleaned,
            "Hip hip\nGone for the summer\nWe'll never feel bad anymore"
        );
    }

    #[test]
    fn test_scrape_without_container_is_none() {
        assert!(scrape_lyrics("<html><body><p>This song is an instrumental</p></body></html>").is_none());
    }

    #[test]
    fn test_scrape_decodes_entities() {
        let html = r#"<div data-lyrics-container="true">Rock &amp; roll</div>"#;
        assert_eq!(scrape_lyrics(html).unwrap().cleaned, "Rock & roll");
    }

    #[test]
    fn test_search_keeps_song_hits_only() {
        let body = r#"{"response": {"hits": [
            {"type": "song", "result": {"id": 1, "title": "Island in the Sun", "primary_artist": {"name": "Weezer"}}},
            {"type": "song", "result": {"id": 2, "title": "Buddy Holly", "primary_artist": {"name": "Weezer"}}}
        ]}}"#;
        let envelope: ApiEnvelope<SearchBody> = serde_json::from_str(body).unwrap();
        let candidates = candidates_from_hits(envelope.response.hits);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].external_id, "1");
        assert_eq!(candidates[1].provider_rank, 1);
    }

    #[test]
    fn test_non_song_hits_filtered() {
        let hits = vec![
            Hit {
                kind: "article".into(),
                result: SongSummary {
                    id: 9,
                    title: "Island in the Sun".into(),
                    primary_artist: PrimaryArtist { name: "Weezer".into() },
                },
            },
            Hit {
                kind: "song".into(),
                result: SongSummary {
                    id: 1,
                    title: "Island in the Sun".into(),
                    primary_artist: PrimaryArtist { name: "Weezer".into() },
                },
            },
        ];
        let candidates = candidates_from_hits(hits);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].external_id, "1");
        assert_eq!(candidates[0].provider_rank, 0);
    }

    #[test]
    fn test_oversized_lyrics_replaced_by_notice() {
        let query = SongQuery::from_cells(0, "Weezer", "Island In The Sun", None).unwrap();
        assert_eq!(fit_to_cell("short".into(), &query, 10), "short");
        assert_eq!(
            fit_to_cell("x".repeat(11), &query, 10),
            "Weezer: Island In The Sun: lyrics exceed the 10 character cell limit"
        );
    }
}
