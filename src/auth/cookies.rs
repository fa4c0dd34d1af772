//! Raw `Cookie` header parser.
//!
//! A logged-in browser session is captured by copying the `Cookie` request
//! header from the browser's developer tools. This module turns that raw
//! string into a flat name/value map and renders it back into a header value
//! for authenticated requests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, instrument, warn};

/// Errors that can occur while loading credentials.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// I/O error reading the raw cookie file.
    #[error("failed to read cookie file {path}: {source}")]
    Io {
        /// Path of the cookie file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file had content but no `name=value` pair could be parsed from it.
    #[error("no cookies found in {path} ({skipped} segments skipped)")]
    NoCookiesFound {
        /// Path of the cookie file.
        path: String,
        /// Number of segments that did not look like `name=value`.
        skipped: usize,
    },
}

/// Session cookies for authenticated requests.
///
/// An empty map means anonymous. Values are redacted in `Debug` output so
/// credentials never end up in logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    cookies: BTreeMap<String, String>,
}

impl Credentials {
    /// Credentials for an anonymous request.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Parses a raw `Cookie` header string (`a=1; b=2`).
    ///
    /// Accepts an optional leading `Cookie:` prefix, line breaks from a header
    /// copied across lines and double-quoted values. Segments without `=` are
    /// skipped. A later duplicate name overwrites the earlier value.
    #[must_use]
    #[instrument(level = "debug", skip(raw))]
    pub fn from_cookie_header(raw: &str) -> Self {
        Self::parse_counting_skips(raw).0
    }

    /// Loads credentials from a file holding a raw `Cookie` header.
    ///
    /// An empty (or whitespace-only) file yields anonymous credentials.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::Io`] if the file cannot be read, or
    /// [`CookieError::NoCookiesFound`] if the file has content but no pairs.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, CookieError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CookieError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let (credentials, skipped) = Self::parse_counting_skips(&raw);
        if credentials.is_empty() && !raw.trim().is_empty() {
            return Err(CookieError::NoCookiesFound {
                path: path.display().to_string(),
                skipped,
            });
        }

        debug!(count = credentials.len(), "loaded session cookies");
        Ok(credentials)
    }

    fn parse_counting_skips(raw: &str) -> (Self, usize) {
        let mut cookies = BTreeMap::new();
        let mut skipped = 0;

        let joined = raw.lines().map(str::trim).collect::<Vec<_>>().join(" ");
        let body = strip_header_name(joined.trim());

        for segment in body.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let Some((name, value)) = segment.split_once('=') else {
                warn!(segment_len = segment.len(), "skipping cookie segment without '='");
                skipped += 1;
                continue;
            };

            let name = name.trim();
            if name.is_empty() {
                warn!("skipping cookie segment with empty name");
                skipped += 1;
                continue;
            }

            let value = unquote(value.trim());
            debug!(name = %name, "parsed cookie");
            cookies.insert(name.to_string(), value.to_string());
        }

        (Self { cookies }, skipped)
    }

    /// Returns `true` when no cookies are present (anonymous request).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Number of cookies held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Returns the value of a cookie. Avoid logging the result.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Cookie names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(String::as_str)
    }

    /// Renders the map as a `Cookie` header value, or `None` when anonymous.
    #[must_use]
    pub fn to_header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

// Custom Debug impl that redacts cookie values.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for name in self.cookies.keys() {
            map.entry(name, &"[REDACTED]");
        }
        map.finish()
    }
}

fn strip_header_name(raw: &str) -> &str {
    match raw.split_once(':') {
        Some((name, rest)) if name.trim().eq_ignore_ascii_case("cookie") => rest,
        _ => raw,
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
