//! Ingestion endpoint resolution.
//!
//! A log submission is routed by its token and categorized by its tags, both
//! of which live in the URL path:
//!
//! ```text
//! https://<ingest-host>/inputs/<token>[/tag/<tag1>,<tag2>,...]
//! ```

use crate::{Error, Result};
use url::Url;

/// Default ingestion base URL; the token and tag segments are appended to it.
pub const DEFAULT_INGEST_URL: &str = "https://logs-01.loggly.com/inputs";

/// Path segment introducing the comma-joined tag list.
const TAG_SEGMENT: &str = "tag";

/// Builds destination URLs from a fixed ingestion base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Creates an endpoint from an absolute ingestion base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or cannot carry path segments
    /// (for example `mailto:` URLs).
    pub fn new(base: impl AsRef<str>) -> Result<Self> {
        let base = Url::parse(base.as_ref())?;
        if base.cannot_be_a_base() {
            return Err(Error::ConfigurationError(format!(
                "Ingestion URL cannot carry a path: {}",
                base
            )));
        }
        Ok(Self { base })
    }

    /// Returns the ingestion base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolves the destination URL for a submission.
    ///
    /// Default tags come first, followed by the per-call tags. Duplicates are
    /// kept and empty tags are skipped. When no tag remains, the `/tag/...`
    /// suffix is omitted entirely.
    ///
    /// # Examples
    ///
    /// ```
    /// use logship::endpoint::Endpoint;
    ///
    /// let endpoint = Endpoint::new("https://logs.example.com/inputs").unwrap();
    /// let url = endpoint
    ///     .resolve("abc123", &["env:prod".to_string()], &["svc:api"])
    ///     .unwrap();
    ///
    /// assert_eq!(
    ///     url.as_str(),
    ///     "https://logs.example.com/inputs/abc123/tag/env:prod,svc:api"
    /// );
    /// ```
    pub fn resolve<D, T>(&self, token: &str, default_tags: &[D], tags: &[T]) -> Result<Url>
    where
        D: AsRef<str>,
        T: AsRef<str>,
    {
        let joined = join_tags(default_tags, tags);

        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                Error::ConfigurationError(format!("Ingestion URL cannot carry a path: {}", self.base))
            })?;
            segments.pop_if_empty().push(token);
            if let Some(joined) = &joined {
                segments.push(TAG_SEGMENT).push(joined);
            }
        }

        Ok(url)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_INGEST_URL).expect("default ingest URL is valid"),
        }
    }
}

/// Comma-joins default tags followed by call tags, or `None` if there are none.
fn join_tags<D, T>(default_tags: &[D], tags: &[T]) -> Option<String>
where
    D: AsRef<str>,
    T: AsRef<str>,
{
    let joined = default_tags
        .iter()
        .map(AsRef::as_ref)
        .chain(tags.iter().map(AsRef::as_ref))
        .filter(|tag| !tag.is_empty())
        .collect::<Vec<_>>()
        .join(",");

    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}
