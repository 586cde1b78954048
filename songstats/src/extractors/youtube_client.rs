// YouTube Data API v3 client (view-count source)
//
// Search: search?part=snippet&type=video for "<artist> <title> official video"
// Fetch: videos?part=statistics for the resolved video id
//
// Video titles are free text. Candidates are parsed from the common
// "Artist - Title" form, falling back to the uploading channel as artist.
//
// API Documentation: https://developers.google.com/youtube/v3/docs

use super::{build_http_client, parse_json, per_second_limiter, read_success_body, DirectRateLimiter, SourceAdapter};
use crate::error::{FatalError, SourceFailure};
use crate::fields;
use crate::types::{CandidateMatch, CanonicalIdentity, FieldMap, FieldValue, SongQuery, Source};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use songstats_common::config::{SourceConfig, TieBreak};
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: VideoRef,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoRef {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    channel_title: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(default)]
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    /// Counts are transmitted as decimal strings
    #[serde(default)]
    view_count: Option<String>,
}

/// YouTube view-count adapter
pub struct YouTubeClient {
    client: Client,
    api_key: String,
    api_base: String,
    search_limit: u32,
    rate_limiter: DirectRateLimiter,
}

impl YouTubeClient {
    pub fn new(api_key: String, config: &SourceConfig) -> Result<Self, FatalError> {
        Ok(Self {
            client: build_http_client(Duration::from_secs(config.timeout_secs))?,
            api_key,
            api_base: API_BASE.to_string(),
            search_limit: config.search_limit.max(1),
            rate_limiter: per_second_limiter(config.requests_per_second),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, SourceFailure> {
        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .get(format!("{}/{}", self.api_base, path))
            .query(query)
            .query(&[("key", &self.api_key)])
            .send()
            .await?;
        read_success_body(response).await
    }
}

#[async_trait]
impl SourceAdapter for YouTubeClient {
    fn source(&self) -> Source {
        Source::VideoViews
    }

    /// Duplicate uploads of one song are common; the provider's relevance
    /// order picks between them.
    fn tie_break(&self) -> TieBreak {
        TieBreak::ProviderRank
    }

    async fn search(&self, query: &SongQuery) -> Result<Vec<CandidateMatch>, SourceFailure> {
        let q = format!("{} {} official video", query.artist, query.title);
        debug!(row = query.row_index, q = %q, "YouTube search");

        let body = self
            .get(
                "search",
                &[
                    ("part", "snippet".to_string()),
                    ("q", q),
                    ("type", "video".to_string()),
                    ("maxResults", self.search_limit.to_string()),
                ],
            )
            .await?;

        let response: SearchResponse = parse_json("YouTube search", &body)?;
        Ok(candidates_from_items(response.items))
    }

    async fn fetch(
        &self,
        identity: &CanonicalIdentity,
        _query: &SongQuery,
    ) -> Result<Option<FieldMap>, SourceFailure> {
        let body = self
            .get(
                "videos",
                &[
                    ("part", "statistics".to_string()),
                    ("id", identity.external_id.clone()),
                ],
            )
            .await?;

        let response: VideosResponse = parse_json("YouTube videos", &body)?;
        let views = response
            .items
            .into_iter()
            .next()
            .and_then(|v| v.statistics)
            .and_then(|s| s.view_count);

        let Some(views) = views else {
            debug!(video = %identity.external_id, "Video has no public view count");
            return Ok(None);
        };
        let views: i64 = views
            .trim()
            .parse()
            .map_err(|_| SourceFailure::Parse(format!("YouTube viewCount '{}' is not a number", views)))?;

        let mut map = FieldMap::new();
        map.insert(fields::YOUTUBE_VIEWS.to_string(), FieldValue::Integer(views));
        map.insert(
            fields::YOUTUBE_VIDEO_ID.to_string(),
            FieldValue::Text(identity.external_id.clone()),
        );
        Ok(Some(map))
    }
}

fn candidates_from_items(items: Vec<SearchItem>) -> Vec<CandidateMatch> {
    items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            let (artist, title) = split_video_title(&item.snippet.title, &item.snippet.channel_title);
            Some((video_id, artist, title))
        })
        .enumerate()
        .map(|(rank, (external_id, artist, title))| CandidateMatch {
            external_id,
            title,
            artist,
            provider_rank: rank,
        })
        .collect()
}

/// Derive (artist, title) from a video title and its channel
///
/// `"Weezer - Island In The Sun"` splits on the first dash; a title without
/// one is attributed to the channel, with `VEVO` and ` - Topic` removed.
fn split_video_title(raw_title: &str, channel: &str) -> (String, String) {
    let title = decode_entities(raw_title);

    for separator in [" - ", " – ", " — "] {
        if let Some((artist, song)) = title.split_once(separator) {
            let (artist, song) = (artist.trim(), song.trim());
            if !artist.is_empty() && !song.is_empty() {
                return (artist.to_string(), song.to_string());
            }
        }
    }

    (channel_artist(&decode_entities(channel)), title.trim().to_string())
}

fn channel_artist(channel: &str) -> String {
    let name = channel.trim();
    let name = name.strip_suffix(" - Topic").unwrap_or(name);
    let name = name.strip_suffix("VEVO").unwrap_or(name);
    name.trim().to_string()
}

/// Decode the HTML entities the search API leaves in snippet text
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
