//! Harvest configuration loaded from an optional JSON file.
//!
//! Every field has a default, so an absent file or a partial file is valid.
//! Values are validated after loading; CLI overrides are applied by the binary
//! on top of the loaded config.
//!
//! ```json
//! {
//!   "endpoints": { "base_url": "https://seekingalpha.com" },
//!   "fetch": { "max_attempts": 3, "rate_limit_ms": 250 },
//!   "discovery": { "failed_page_policy": "stop" },
//!   "comments": { "content_policy": "ascii_only" },
//!   "database_path": "harvest.db"
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::comments::ContentPolicy;
use crate::discover::FailedPagePolicy;

/// Browser User-Agent sent on every request; the site rejects unknown agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_2) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/65.0.3325.181 Safari/537.36";

const DEFAULT_BASE_URL: &str = "https://seekingalpha.com";
const DEFAULT_ARTICLE_PATH: &str = "/article/{id}";
const DEFAULT_LISTING_PATH: &str = "/symbol/{symbol}/more_focus?page={page}";
const DEFAULT_COMMENTS_PATH: &str = "/account/ajax_get_comments?id={id}&type=Article&commentType=";

const MAX_ATTEMPTS_LIMIT: u32 = 10;
const MAX_INTERVAL_MS: u64 = 60_000;
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`HarvestConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is outside its accepted range or malformed.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// What was wrong.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Top-level harvest configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Content-site endpoint templates.
    pub endpoints: Endpoints,
    /// Fetch retry, pacing and timeout settings.
    pub fetch: FetchSettings,
    /// Listing-page discovery settings.
    pub discovery: DiscoverySettings,
    /// Comment handling settings.
    pub comments: CommentSettings,
    /// SQLite database file.
    pub database_path: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            fetch: FetchSettings::default(),
            discovery: DiscoverySettings::default(),
            comments: CommentSettings::default(),
            database_path: PathBuf::from("harvest.db"),
        }
    }
}

impl HarvestConfig {
    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed or validated.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!("loaded config file");
        Ok(config)
    }

    /// Parses and validates a JSON config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoints.validate()?;
        self.fetch.validate()?;

        if self.discovery.page_interval_ms > MAX_INTERVAL_MS {
            return Err(ConfigError::invalid(
                "discovery.page_interval_ms",
                format!(
                    "{} exceeds {MAX_INTERVAL_MS}",
                    self.discovery.page_interval_ms
                ),
            ));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("database_path", "must not be empty"));
        }

        Ok(())
    }
}

/// Content-site URL templates.
///
/// Paths are appended to `base_url` after placeholder substitution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    /// Scheme and host of the content site, e.g. `https://seekingalpha.com`.
    pub base_url: String,
    /// Article detail page; must contain `{id}`.
    pub article_path: String,
    /// Paginated symbol listing; must contain `{symbol}` and `{page}`.
    pub listing_path: String,
    /// Comment-list JSON endpoint; must contain `{id}`.
    pub comments_path: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            article_path: DEFAULT_ARTICLE_PATH.to_string(),
            listing_path: DEFAULT_LISTING_PATH.to_string(),
            comments_path: DEFAULT_COMMENTS_PATH.to_string(),
        }
    }
}

impl Endpoints {
    /// Endpoints rooted at a different base URL, keeping the default paths.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// URL of an article detail page.
    #[must_use]
    pub fn article_url(&self, id: &str) -> String {
        self.join(&self.article_path.replace("{id}", id))
    }

    /// URL of one listing page for a symbol.
    #[must_use]
    pub fn listing_url(&self, symbol: &str, page: u32) -> String {
        let path = self
            .listing_path
            .replace("{symbol}", &urlencoding::encode(symbol))
            .replace("{page}", &page.to_string());
        self.join(&path)
    }

    /// URL of the comment-list payload for an article.
    #[must_use]
    pub fn comments_url(&self, id: &str) -> String {
        self.join(&self.comments_path.replace("{id}", id))
    }

    fn join(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let parsed = Url::parse(&self.base_url).map_err(|e| {
            ConfigError::invalid("endpoints.base_url", format!("'{}': {e}", self.base_url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "endpoints.base_url",
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        require_placeholder("endpoints.article_path", &self.article_path, "{id}")?;
        require_placeholder("endpoints.listing_path", &self.listing_path, "{symbol}")?;
        require_placeholder("endpoints.listing_path", &self.listing_path, "{page}")?;
        require_placeholder("endpoints.comments_path", &self.comments_path, "{id}")?;
        Ok(())
    }
}

fn require_placeholder(
    field: &'static str,
    template: &str,
    placeholder: &str,
) -> Result<(), ConfigError> {
    if template.contains(placeholder) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("'{template}' is missing the {placeholder} placeholder"),
        ))
    }
}

/// Fetch behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    /// Attempts per request including the first (1..=10).
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub backoff_base_ms: u64,
    /// Backoff cap.
    pub backoff_max_ms: u64,
    /// Minimum spacing between requests to the same host; 0 disables.
    pub rate_limit_ms: u64,
    /// TCP connect timeout.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout.
    pub read_timeout_secs: u64,
    /// Identifying `User-Agent` header.
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_base_ms: 1000,
            backoff_max_ms: 32_000,
            rate_limit_ms: 0,
            connect_timeout_secs: 30,
            read_timeout_secs: 60,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchSettings {
    /// Backoff before the first retry as a [`Duration`].
    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Backoff cap as a [`Duration`].
    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(ConfigError::invalid(
                "fetch.max_attempts",
                format!("{} not in 1..={MAX_ATTEMPTS_LIMIT}", self.max_attempts),
            ));
        }
        for (field, value) in [
            ("fetch.backoff_base_ms", self.backoff_base_ms),
            ("fetch.backoff_max_ms", self.backoff_max_ms),
            ("fetch.rate_limit_ms", self.rate_limit_ms),
        ] {
            if value > MAX_INTERVAL_MS {
                return Err(ConfigError::invalid(
                    field,
                    format!("{value} exceeds {MAX_INTERVAL_MS}"),
                ));
            }
        }
        for (field, value) in [
            ("fetch.connect_timeout_secs", self.connect_timeout_secs),
            ("fetch.read_timeout_secs", self.read_timeout_secs),
        ] {
            if !(1..=MAX_TIMEOUT_SECS).contains(&value) {
                return Err(ConfigError::invalid(
                    field,
                    format!("{value} not in 1..={MAX_TIMEOUT_SECS}"),
                ));
            }
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::invalid("fetch.user_agent", "must not be empty"));
        }
        Ok(())
    }
}

/// Listing-page discovery behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoverySettings {
    /// Pause between successive listing pages.
    pub page_interval_ms: u64,
    /// What a failed listing page does to the discovery run.
    pub failed_page_policy: FailedPagePolicy,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            page_interval_ms: 500,
            failed_page_policy: FailedPagePolicy::default(),
        }
    }
}

impl DiscoverySettings {
    /// Pause between pages as a [`Duration`].
    #[must_use]
    pub fn page_interval(&self) -> Duration {
        Duration::from_millis(self.page_interval_ms)
    }
}

/// Comment handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CommentSettings {
    /// How comment text is sanitized before persistence.
    pub content_policy: ContentPolicy,
}
