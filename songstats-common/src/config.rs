//! Configuration loading and credential resolution
//!
//! Settings are layered with the following priority:
//! 1. Command-line arguments (handled by the binary)
//! 2. Environment variables (credentials only)
//! 3. TOML config file
//! 4. Built-in defaults
//!
//! A missing TOML file at the default location is not an error: the
//! built-in defaults are used and a warning is logged. A missing file that
//! was explicitly requested is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Application directory name under the platform config directory
const APP_DIR: &str = "songstats";

/// Config file name inside [`APP_DIR`]
const CONFIG_FILE: &str = "config.toml";

/// Complete TOML configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Defaults for the command surface
    pub defaults: DefaultsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Identity resolution policy
    pub resolver: ResolverConfig,
    /// Per-source request budgets and behavior
    pub sources: SourcesConfig,
    /// Destination spreadsheet client settings
    pub sheets: SheetsConfig,
    /// Identity cache settings
    pub cache: CacheConfig,
    /// Credentials (environment variables take precedence)
    pub credentials: CredentialsConfig,
}

/// Command defaults used when the CLI omits them
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub spreadsheet: Option<String>,
    /// Worksheet title or zero-based index
    pub worksheet: Option<String>,
    pub methods: Option<Vec<String>>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Identity resolver policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Scores below this are withheld as ambiguous (0.0-1.0)
    pub confidence_threshold: f64,
    /// Two distinct candidates within this distance of the best score tie
    pub tie_epsilon: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            tie_epsilon: 0.02,
        }
    }
}

/// How the resolver treats two distinct candidates that score alike
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Report the match as ambiguous
    Reject,
    /// Take the candidate the provider ranked first
    ProviderRank,
}

/// Settings for all three sources
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub catalog: SourceConfig,
    pub views: SourceConfig,
    pub lyrics: SourceConfig,
}

/// Settings for one source
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Token bucket refill rate
    pub requests_per_second: u32,
    /// Upper bound for one lookup (search + fetch)
    pub timeout_secs: u64,
    /// Maximum candidates requested from the search endpoint
    pub search_limit: u32,
    /// Overrides the source's default tie-break policy
    pub tie_break: Option<TieBreak>,
    /// Longest text value written to a single cell (lyrics only)
    pub max_cell_chars: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 3,
            timeout_secs: 20,
            search_limit: 5,
            tie_break: None,
            max_cell_chars: None,
        }
    }
}

/// Destination spreadsheet client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Sheets API write quota per user is 60 requests/minute
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            timeout_secs: 30,
        }
    }
}

/// Identity cache settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// JSON file persisting resolved identities between runs
    pub path: Option<PathBuf>,
}

/// Credentials stored in the TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub youtube_api_key: Option<String>,
    pub genius_access_token: Option<String>,
    pub google_sheets_access_token: Option<String>,
}

impl TomlConfig {
    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                Some(path) => {
                    warn!(
                        "No config file at {}, using built-in defaults",
                        path.display()
                    );
                    Ok(Self::default())
                }
                None => {
                    warn!("Could not determine config directory, using built-in defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Parse and validate a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<()> {
        let r = &self.resolver;
        if !(0.0..=1.0).contains(&r.confidence_threshold) {
            return Err(Error::Config(format!(
                "resolver.confidence_threshold must be within 0.0-1.0, got {}",
                r.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&r.tie_epsilon) {
            return Err(Error::Config(format!(
                "resolver.tie_epsilon must be within 0.0-1.0, got {}",
                r.tie_epsilon
            )));
        }

        for (name, source) in [
            ("catalog", &self.sources.catalog),
            ("views", &self.sources.views),
            ("lyrics", &self.sources.lyrics),
        ] {
            if source.requests_per_second == 0 {
                return Err(Error::Config(format!(
                    "sources.{name}.requests_per_second must be at least 1"
                )));
            }
            if source.timeout_secs == 0 {
                return Err(Error::Config(format!(
                    "sources.{name}.timeout_secs must be at least 1"
                )));
            }
            if source.search_limit == 0 {
                return Err(Error::Config(format!(
                    "sources.{name}.search_limit must be at least 1"
                )));
            }
            if source.max_cell_chars == Some(0) {
                return Err(Error::Config(format!(
                    "sources.{name}.max_cell_chars must be at least 1"
                )));
            }
        }

        if self.sheets.requests_per_minute == 0 {
            return Err(Error::Config(
                "sheets.requests_per_minute must be at least 1".to_string(),
            ));
        }
        if self.sheets.timeout_secs == 0 {
            return Err(Error::Config(
                "sheets.timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default config file location for the platform
///
/// `~/.config/songstats/config.toml` on Linux, the equivalent
/// application-support directory elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

/// Credential kinds understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    SpotifyClientId,
    SpotifyClientSecret,
    YoutubeApiKey,
    GeniusAccessToken,
    GoogleSheetsAccessToken,
}

impl Credential {
    /// Environment variable holding this credential
    pub fn env_var(self) -> &'static str {
        match self {
            Self::SpotifyClientId => "SPOTIFY_CLIENT_ID",
            Self::SpotifyClientSecret => "SPOTIFY_CLIENT_SECRET",
            Self::YoutubeApiKey => "YOUTUBE_API_KEY",
            Self::GeniusAccessToken => "GENIUS_ACCESS_TOKEN",
            Self::GoogleSheetsAccessToken => "GOOGLE_SHEETS_ACCESS_TOKEN",
        }
    }

    /// Key of this credential in the `[credentials]` TOML table
    pub fn toml_key(self) -> &'static str {
        match self {
            Self::SpotifyClientId => "spotify_client_id",
            Self::SpotifyClientSecret => "spotify_client_secret",
            Self::YoutubeApiKey => "youtube_api_key",
            Self::GeniusAccessToken => "genius_access_token",
            Self::GoogleSheetsAccessToken => "google_sheets_access_token",
        }
    }

    fn from_toml(self, creds: &CredentialsConfig) -> Option<&String> {
        match self {
            Self::SpotifyClientId => creds.spotify_client_id.as_ref(),
            Self::SpotifyClientSecret => creds.spotify_client_secret.as_ref(),
            Self::YoutubeApiKey => creds.youtube_api_key.as_ref(),
            Self::GeniusAccessToken => creds.genius_access_token.as_ref(),
            Self::GoogleSheetsAccessToken => creds.google_sheets_access_token.as_ref(),
        }
    }
}

/// Resolve a credential from the environment, then from TOML
///
/// **Priority:** ENV → TOML. Blank values are ignored.
pub fn resolve_credential(kind: Credential, creds: &CredentialsConfig) -> Option<String> {
    let env_value = std::env::var(kind.env_var())
        .ok()
        .filter(|v| is_valid_key(v));
    let toml_value = kind.from_toml(creds).filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment and TOML config. Using environment.",
            kind.env_var()
        );
    }

    env_value.or_else(|| toml_value.cloned())
}

/// Resolve a credential or fail with setup instructions
pub fn require_credential(kind: Credential, creds: &CredentialsConfig) -> Result<String> {
    resolve_credential(kind, creds).ok_or_else(|| {
        Error::Config(format!(
            "{env} not configured. Please configure using one of:\n\
             1. Environment: {env}=your-value\n\
             2. TOML config: [credentials] {key} = \"your-value\"",
            env = kind.env_var(),
            key = kind.toml_key(),
        ))
    })
}

/// Validate credential value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
