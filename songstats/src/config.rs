//! Run configuration
//!
//! Combines command-line arguments with [`TomlConfig`] into what a run
//! needs: the target worksheet, the requested sources, one adapter per
//! source with its credentials, and the optional identity cache.
//!
//! **Priority:** CLI → TOML `[defaults]` → built-in defaults.
//! Credentials: ENV → TOML `[credentials]`. A requested source without
//! credentials is a configuration error, reported before any row is read.

use crate::error::FatalError;
use crate::extractors::{GeniusClient, SourceAdapter, SpotifyClient, YouTubeClient};
use crate::fusion::{IdentityCache, ResolverPolicy, RowEnricher};
use crate::types::Source;
use songstats_common::config::{
    require_credential, Credential, DefaultsConfig, SourceConfig, TomlConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Spreadsheet and worksheet to enrich
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    pub spreadsheet: String,
    /// Worksheet title or zero-based index
    pub worksheet: String,
}

/// Resolve the target table from CLI arguments, then `[defaults]`
pub fn resolve_target(
    spreadsheet: Option<String>,
    worksheet: Option<String>,
    defaults: &DefaultsConfig,
) -> Result<RunTarget, FatalError> {
    let spreadsheet = pick("spreadsheet", spreadsheet, defaults.spreadsheet.as_ref())
        .ok_or_else(|| {
            FatalError::Config(
                "No spreadsheet given. Pass it as the first argument or set \
                 [defaults] spreadsheet in the config file"
                    .to_string(),
            )
        })?;
    let worksheet = pick("worksheet", worksheet, defaults.worksheet.as_ref())
        .unwrap_or_else(|| "0".to_string());

    Ok(RunTarget {
        spreadsheet,
        worksheet,
    })
}

fn pick(what: &str, cli: Option<String>, toml: Option<&String>) -> Option<String> {
    let cli = cli.filter(|v| !v.trim().is_empty());
    let toml = toml.filter(|v| !v.trim().is_empty());

    if let (Some(c), Some(t)) = (&cli, toml) {
        if c != t {
            info!("{} '{}' from command line overrides config '{}'", what, c, t);
        }
    }
    cli.or_else(|| toml.cloned())
}

/// Parse requested methods; empty means `[defaults] methods`, else all
///
/// Accepts method names (`catalog`, `views`, `lyrics`) and provider names
/// (`spotify`, `youtube`, `genius`). Duplicates are dropped, order kept.
pub fn resolve_sources(cli_methods: &[String], defaults: &DefaultsConfig) -> Result<Vec<Source>, FatalError> {
    let methods: Vec<&String> = if !cli_methods.is_empty() {
        cli_methods.iter().collect()
    } else if let Some(methods) = defaults.methods.as_ref().filter(|m| !m.is_empty()) {
        methods.iter().collect()
    } else {
        return Ok(Source::ALL.to_vec());
    };

    let mut sources = Vec::new();
    for method in methods {
        let source: Source = method.parse().map_err(FatalError::Config)?;
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    Ok(sources)
}

/// `[sources.<name>]` section for a source
pub fn source_config(config: &TomlConfig, source: Source) -> &SourceConfig {
    match source {
        Source::Catalog => &config.sources.catalog,
        Source::VideoViews => &config.sources.views,
        Source::Lyrics => &config.sources.lyrics,
    }
}

/// Resolver policy for a source: `[resolver]` plus the source's tie-break
///
/// The tie-break comes from `[sources.<name>] tie_break` when set, else
/// from the adapter's default.
pub fn resolver_policy(config: &TomlConfig, adapter: &dyn SourceAdapter) -> ResolverPolicy {
    let tie_break = source_config(config, adapter.source())
        .tie_break
        .unwrap_or_else(|| adapter.tie_break());
    ResolverPolicy::from_config(&config.resolver, tie_break)
}

/// Build the adapter for one source, resolving its credentials
pub fn build_adapter(config: &TomlConfig, source: Source) -> Result<Arc<dyn SourceAdapter>, FatalError> {
    let creds = &config.credentials;
    let settings = source_config(config, source);

    let adapter: Arc<dyn SourceAdapter> = match source {
        Source::Catalog => Arc::new(SpotifyClient::new(
            require_credential(Credential::SpotifyClientId, creds)?,
            require_credential(Credential::SpotifyClientSecret, creds)?,
            settings,
        )?),
        Source::VideoViews => Arc::new(YouTubeClient::new(
            require_credential(Credential::YoutubeApiKey, creds)?,
            settings,
        )?),
        Source::Lyrics => Arc::new(GeniusClient::new(
            require_credential(Credential::GeniusAccessToken, creds)?,
            settings,
        )?),
    };

    info!(
        source = %source,
        provider = source.provider(),
        requests_per_second = settings.requests_per_second,
        timeout_secs = settings.timeout_secs,
        "Configured source adapter"
    );
    Ok(adapter)
}

/// Row enricher with an adapter for every requested source
pub fn build_enricher(
    config: &TomlConfig,
    sources: &[Source],
    cache: Option<Arc<IdentityCache>>,
) -> Result<RowEnricher, FatalError> {
    let mut enricher = RowEnricher::new();
    for &source in sources {
        let adapter = build_adapter(config, source)?;
        enricher = with_configured_adapter(enricher, config, adapter);
    }
    if let Some(cache) = cache {
        enricher = enricher.with_cache(cache);
    }
    Ok(enricher)
}

/// Register an adapter using its source's configured policy and timeout
pub fn with_configured_adapter(
    enricher: RowEnricher,
    config: &TomlConfig,
    adapter: Arc<dyn SourceAdapter>,
) -> RowEnricher {
    let policy = resolver_policy(config, adapter.as_ref());
    let timeout = Duration::from_secs(source_config(config, adapter.source()).timeout_secs);
    enricher.with_adapter(adapter, policy, timeout)
}

/// Bearer token for the destination spreadsheet
pub fn sheets_access_token(config: &TomlConfig) -> Result<String, FatalError> {
    Ok(require_credential(
        Credential::GoogleSheetsAccessToken,
        &config.credentials,
    )?)
}

/// Open the identity cache configured under `[cache]`
///
/// An unreadable cache file is logged and replaced by an empty cache.
pub fn open_cache(config: &TomlConfig) -> Option<Arc<IdentityCache>> {
    let path = config.cache.path.as_ref()?;
    match IdentityCache::load(path) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Identity cache unreadable; starting empty");
            Some(Arc::new(IdentityCache::load_fresh(path)))
        }
    }
}
