//! The seam between extraction and the remote API client.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CursorValue, RawRecord};

/// Base URL of the public Chorus API.
pub const DEFAULT_API_URL: &str = "https://chorus.ai";

/// Upstream record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Calls and meetings.
    Engagements,
    Scorecards,
    Emails,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Engagements => "engagements",
            StreamKind::Scorecards => "scorecards",
            StreamKind::Emails => "emails",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream-specific request flags (e.g. `with_trackers=true`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    flags: BTreeMap<String, String>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Errors raised by an upstream client.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("failed to initialize client: {0}")]
    Init(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited (429)")]
    RateLimited,

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// A lazy, finite sequence of pages for one fetch.
pub trait PageSource: Send {
    /// Fetch the next page. `Ok(None)` once the sequence is exhausted.
    fn next_page(&mut self) -> impl Future<Output = UpstreamResult<Option<Vec<RawRecord>>>> + Send;
}

/// Remote API client used by stream extraction.
pub trait UpstreamClient: Send + Sync {
    type Pages: PageSource;

    /// Start a fetch of `kind` records at or after `min_cursor`.
    ///
    /// Implementations must return records in non-decreasing cursor order.
    fn fetch(
        &self,
        kind: StreamKind,
        min_cursor: &CursorValue,
        options: &FetchOptions,
    ) -> impl Future<Output = UpstreamResult<Self::Pages>> + Send;
}

/// Pages held in memory, optionally ending with an error.
#[derive(Debug, Default)]
pub struct StaticPages {
    pages: VecDeque<Vec<RawRecord>>,
    error: Option<UpstreamError>,
}

impl StaticPages {
    pub fn new(pages: Vec<Vec<RawRecord>>) -> Self {
        Self {
            pages: pages.into(),
            error: None,
        }
    }

    /// Fail with `error` once the pages are exhausted.
    pub fn then_fail(mut self, error: UpstreamError) -> Self {
        self.error = Some(error);
        self
    }
}

impl PageSource for StaticPages {
    fn next_page(&mut self) -> impl Future<Output = UpstreamResult<Option<Vec<RawRecord>>>> + Send {
        let next = match self.pages.pop_front() {
            Some(page) => Ok(Some(page)),
            None => match self.error.take() {
                Some(e) => Err(e),
                None => Ok(None),
            },
        };
        async move { next }
    }
}
