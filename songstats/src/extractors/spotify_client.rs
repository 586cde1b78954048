// Spotify Web API client (catalog source)
//
// Search: /v1/search?type=track with a field-filtered query
// Fetch: track + audio features + primary artist
//
// Audio features and artist lookups are best effort: Spotify has restricted
// the audio-features endpoint for newer applications, so a failure there
// yields Null fields instead of failing the whole lookup.
//
// API Documentation: https://developer.spotify.com/documentation/web-api

use super::{build_http_client, parse_json, per_second_limiter, read_success_body, DirectRateLimiter, SourceAdapter};
use crate::error::{FatalError, SourceFailure};
use crate::fields;
use crate::types::{CandidateMatch, CanonicalIdentity, FieldMap, FieldValue, SongQuery, Source};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use songstats_common::config::SourceConfig;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Refresh the access token this long before Spotify expires it
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    id: String,
    name: String,
    #[serde(default)]
    popularity: Option<i64>,
    #[serde(default)]
    duration_ms: Option<i64>,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    #[serde(default)]
    album: Option<Album>,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    release_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AudioFeatures {
    tempo: Option<f64>,
    energy: Option<f64>,
    danceability: Option<f64>,
    valence: Option<f64>,
    loudness: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Artist {
    #[serde(default)]
    genres: Vec<String>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Spotify catalog adapter
///
/// Uses the client-credentials flow; the access token is cached until
/// shortly before it expires and dropped on any 401.
pub struct SpotifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    api_base: String,
    token_url: String,
    search_limit: u32,
    token: Mutex<Option<AccessToken>>,
    rate_limiter: DirectRateLimiter,
}

impl SpotifyClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        config: &SourceConfig,
    ) -> Result<Self, FatalError> {
        Ok(Self {
            client: build_http_client(Duration::from_secs(config.timeout_secs))?,
            client_id,
            client_secret,
            api_base: API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            search_limit: config.search_limit.max(1),
            token: Mutex::new(None),
            rate_limiter: per_second_limiter(config.requests_per_second),
        })
    }

    /// Point the client at another API host (local mocks)
    pub fn with_endpoints(mut self, api_base: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.token_url = token_url.into();
        self
    }

    async fn access_token(&self) -> Result<String, SourceFailure> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        self.rate_limiter.until_ready().await;
        debug!("Requesting Spotify access token");

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            // The accounts service answers bad credentials with 400
            return Err(match SourceFailure::from_status(status, &body) {
                SourceFailure::Provider { status: 400, message } => SourceFailure::Auth(message),
                other => other,
            });
        }

        let token: TokenResponse = parse_json("Spotify token", &body)?;
        let value = token.access_token.clone();
        *guard = Some(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    /// Authorized GET returning the raw body
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, SourceFailure> {
        let token = self.access_token().await?;
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            *self.token.lock().await = None;
        }
        read_success_body(response).await
    }

    /// Best-effort GET: any failure is logged and yields the default value
    async fn get_optional<T>(&self, path: &str, what: &str, id: &str) -> T
    where
        T: Default + serde::de::DeserializeOwned,
    {
        let result = match self.get(path, &[]).await {
            Ok(body) => parse_json::<T>("Spotify", &body),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!(id = %id, error = %e, "Spotify {} unavailable", what);
            T::default()
        })
    }
}

#[async_trait]
impl SourceAdapter for SpotifyClient {
    fn source(&self) -> Source {
        Source::Catalog
    }

    async fn search(&self, query: &SongQuery) -> Result<Vec<CandidateMatch>, SourceFailure> {
        let q = format!(r#"track:"{}" artist:"{}""#, query.title, query.artist);
        debug!(row = query.row_index, q = %q, "Spotify search");

        let body = self
            .get(
                "/search",
                &[
                    ("q", q),
                    ("type", "track".to_string()),
                    ("limit", self.search_limit.to_string()),
                ],
            )
            .await?;

        let response: SearchResponse = parse_json("Spotify search", &body)?;
        Ok(candidates_from_tracks(response.tracks.items))
    }

    async fn fetch(
        &self,
        identity: &CanonicalIdentity,
        _query: &SongQuery,
    ) -> Result<Option<FieldMap>, SourceFailure> {
        let id = &identity.external_id;

        let body = match self.get(&format!("/tracks/{}", id), &[]).await {
            Ok(body) => body,
            Err(SourceFailure::Provider { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let track: Track = parse_json("Spotify track", &body)?;

        let features: AudioFeatures = self
            .get_optional(&format!("/audio-features/{}", id), "audio features", id)
            .await;

        let artist: Artist = match track.artists.first() {
            Some(a) => self.get_optional(&format!("/artists/{}", a.id), "artist", &a.id).await,
            None => Artist::default(),
        };

        Ok(Some(track_fields(&track, &features, &artist)))
    }
}

fn candidates_from_tracks(tracks: Vec<Track>) -> Vec<CandidateMatch> {
    tracks
        .into_iter()
        .enumerate()
        .map(|(rank, track)| CandidateMatch {
            artist: track
                .artists
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            external_id: track.id,
            title: track.name,
            provider_rank: rank,
        })
        .collect()
}

fn track_fields(track: &Track, features: &AudioFeatures, artist: &Artist) -> FieldMap {
    let mut map = FieldMap::new();
    let mut put = |name: &str, value: FieldValue| {
        map.insert(name.to_string(), value);
    };

    put(fields::TRACK_ID, FieldValue::Text(track.id.clone()));
    put(fields::SONG_POPULARITY, integer(track.popularity));
    put(fields::DURATION, integer(track.duration_ms.map(|ms| ms / 1000)));
    put(fields::TEMPO, FieldValue::rounded(features.tempo, 1));
    put(fields::ENERGY, FieldValue::rounded(features.energy, 3));
    put(fields::DANCEABILITY, FieldValue::rounded(features.danceability, 3));
    put(fields::VALENCE, FieldValue::rounded(features.valence, 3));
    put(fields::LOUDNESS, FieldValue::rounded(features.loudness, 1));
    put(
        fields::ARTIST_ID,
        track
            .artists
            .first()
            .map(|a| FieldValue::Text(a.id.clone()))
            .unwrap_or(FieldValue::Null),
    );
    put(
        fields::YEAR,
        integer(
            track
                .album
                .as_ref()
                .and_then(|a| a.release_date.as_deref())
                .and_then(release_year),
        ),
    );
    put(
        fields::GENRES,
        if artist.genres.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Text(artist.genres.join(", "))
        },
    );

    map
}

fn integer(value: Option<i64>) -> FieldValue {
    value.map(FieldValue::Integer).unwrap_or(FieldValue::Null)
}

/// Year from a release date of any precision ("1999", "1999-05", "1999-05-15")
fn release_year(date: &str) -> Option<i64> {
    date.get(..4).and_then(|y| y.parse().ok())
}
