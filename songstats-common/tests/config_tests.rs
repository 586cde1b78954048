//! Configuration loading and credential resolution tests
//!
//! Tests that manipulate credential environment variables are marked
//! #[serial] so they never run in parallel.

use serial_test::serial;
use songstats_common::config::{
    require_credential, resolve_credential, Credential, CredentialsConfig, TieBreak, TomlConfig,
};
use songstats_common::Error;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_explicit_file() {
    let file = write_config(
        r#"
        [defaults]
        spreadsheet = "Encyclopedia o' Riffs"
        worksheet = "0"
        methods = ["catalog", "views"]

        [logging]
        level = "debug"

        [resolver]
        confidence_threshold = 0.7

        [sources.lyrics]
        max_cell_chars = 40000
        tie_break = "reject"

        [cache]
        path = "/tmp/songstats-cache.json"
        "#,
    );

    let config = TomlConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.defaults.spreadsheet.as_deref(), Some("Encyclopedia o' Riffs"));
    assert_eq!(config.defaults.worksheet.as_deref(), Some("0"));
    assert_eq!(
        config.defaults.methods,
        Some(vec!["catalog".to_string(), "views".to_string()])
    );
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.resolver.confidence_threshold, 0.7);
    assert_eq!(config.resolver.tie_epsilon, 0.02);
    assert_eq!(config.sources.lyrics.max_cell_chars, Some(40000));
    assert_eq!(config.sources.lyrics.tie_break, Some(TieBreak::Reject));
    assert!(config.cache.path.is_some());
}

#[test]
fn test_load_missing_explicit_file_is_error() {
    let result = TomlConfig::load(Some(std::path::Path::new(
        "/nonexistent/songstats/config.toml",
    )));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_malformed_file_is_parse_error() {
    let file = write_config("[resolver\nconfidence_threshold = ");
    let result = TomlConfig::load(Some(file.path()));
    assert!(matches!(result, Err(Error::TomlParse(_))));
}

#[test]
fn test_load_rejects_invalid_values() {
    let file = write_config(
        r#"
        [sheets]
        requests_per_minute = 0
        "#,
    );
    let result = TomlConfig::load(Some(file.path()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_credential_env_takes_precedence_over_toml() {
    env::set_var("GENIUS_ACCESS_TOKEN", "from-env");
    let creds = CredentialsConfig {
        genius_access_token: Some("from-toml".to_string()),
        ..Default::default()
    };

    let value = resolve_credential(Credential::GeniusAccessToken, &creds);
    env::remove_var("GENIUS_ACCESS_TOKEN");

    assert_eq!(value.as_deref(), Some("from-env"));
}

#[test]
#[serial]
fn test_credential_falls_back_to_toml() {
    env::remove_var("YOUTUBE_API_KEY");
    let creds = CredentialsConfig {
        youtube_api_key: Some("toml-key".to_string()),
        ..Default::default()
    };

    let value = resolve_credential(Credential::YoutubeApiKey, &creds);
    assert_eq!(value.as_deref(), Some("toml-key"));
}

#[test]
#[serial]
fn test_blank_credentials_are_ignored() {
    env::set_var("SPOTIFY_CLIENT_ID", "   ");
    let creds = CredentialsConfig {
        spotify_client_id: Some(String::new()),
        ..Default::default()
    };

    let result = require_credential(Credential::SpotifyClientId, &creds);
    env::remove_var("SPOTIFY_CLIENT_ID");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("SPOTIFY_CLIENT_ID"));
    assert!(err.to_string().contains("spotify_client_id"));
}
