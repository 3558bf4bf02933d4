//! Ordered list of functionally equivalent upstream endpoints.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Public mirrors consulted, in order, when none are configured.
pub const DEFAULT_MIRRORS: [&str; 3] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://lz4.overpass-api.de/api/interpreter",
];

/// Errors raised while building a [`Mirror`] or [`MirrorList`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    /// The endpoint is not a valid absolute URL.
    #[error("mirror {url:?} is not a valid URL: {source}")]
    InvalidUrl {
        /// Rejected input.
        url: String,
        /// Parser diagnostic.
        #[source]
        source: url::ParseError,
    },
    /// The endpoint uses a scheme other than `http` or `https`.
    #[error("mirror {url:?} must use http or https")]
    UnsupportedScheme {
        /// Rejected input.
        url: String,
    },
    /// No mirrors were supplied.
    #[error("at least one mirror is required")]
    Empty,
}

/// A single upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    url: Url,
}

impl Mirror {
    /// Parse and validate an endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when the input is not an absolute `http` or
    /// `https` URL.
    pub fn parse(raw: &str) -> Result<Self, MirrorError> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed).map_err(|source| MirrorError::InvalidUrl {
            url: trimmed.to_owned(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MirrorError::UnsupportedScheme {
                url: trimmed.to_owned(),
            });
        }
        Ok(Self { url })
    }

    /// Endpoint URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Endpoint URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-empty, fixed-order sequence of mirrors.
///
/// Every request walks the list from the front; there is no health-based
/// reordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorList {
    mirrors: Vec<Mirror>,
}

impl MirrorList {
    /// Build a list from already parsed mirrors.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Empty`] when `mirrors` is empty.
    pub fn new(mirrors: Vec<Mirror>) -> Result<Self, MirrorError> {
        if mirrors.is_empty() {
            return Err(MirrorError::Empty);
        }
        Ok(Self { mirrors })
    }

    /// Parse every URL in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`MirrorError`] encountered, or
    /// [`MirrorError::Empty`] when no URLs are supplied.
    pub fn parse<I, S>(urls: I) -> Result<Self, MirrorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mirrors = urls
            .into_iter()
            .map(|url| Mirror::parse(url.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(mirrors)
    }

    /// Mirrors in consultation order.
    pub fn iter(&self) -> impl Iterator<Item = &Mirror> {
        self.mirrors.iter()
    }

    /// Number of mirrors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.mirrors.len()
    }

    /// Always `false`; kept for API symmetry with [`MirrorList::len`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

impl Default for MirrorList {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS
                .iter()
                .filter_map(|url| Mirror::parse(url).ok())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn default_list_contains_every_public_mirror() {
        let list = MirrorList::default();

        let urls: Vec<_> = list.iter().map(Mirror::as_str).collect();
        assert_eq!(urls, DEFAULT_MIRRORS);
    }

    #[rstest]
    fn parse_preserves_order() {
        let list = MirrorList::parse(["http://b.test/api", " http://a.test/api "])
            .expect("mirrors should parse");

        let urls: Vec<_> = list.iter().map(ToString::to_string).collect();
        assert_eq!(urls, ["http://b.test/api", "http://a.test/api"]);
    }

    #[rstest]
    fn empty_list_is_rejected() {
        let err = MirrorList::parse(Vec::<String>::new()).expect_err("empty list must fail");

        assert_eq!(err, MirrorError::Empty);
    }

    #[rstest]
    #[case::relative("/api/interpreter")]
    #[case::garbage("not a url")]
    fn invalid_urls_are_rejected(#[case] raw: &str) {
        let err = Mirror::parse(raw).expect_err("invalid URL must fail");

        assert!(matches!(err, MirrorError::InvalidUrl { .. }));
    }

    #[rstest]
    fn non_http_scheme_is_rejected() {
        let err = Mirror::parse("ftp://mirror.test/api").expect_err("ftp must fail");

        assert!(matches!(err, MirrorError::UnsupportedScheme { .. }));
    }
}
