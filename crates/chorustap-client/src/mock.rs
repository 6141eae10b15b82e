use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chorustap_core::{
    coerce_timestamp, CursorValue, FetchOptions, RawRecord, Registry, StaticPages, StreamKind,
    UpstreamClient, UpstreamError, UpstreamResult,
};

/// A fetch the mock has served.
#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    pub kind: StreamKind,
    pub min_cursor: CursorValue,
    pub options: FetchOptions,
}

/// A mock Chorus client for testing.
///
/// Serves the records it was given, filtered to those at or after the
/// requested cursor, split into pages of `page_size`.
#[derive(Clone)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    records: HashMap<StreamKind, Vec<RawRecord>>,
    page_size: usize,
    /// If set, every fetch fails with this error.
    fail_with: Option<UpstreamError>,
    /// If set, a kind's pages end with this error instead of finishing.
    fail_after_pages: HashMap<StreamKind, (usize, UpstreamError)>,
    requests: Vec<MockRequest>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                records: HashMap::new(),
                page_size: 100,
                fail_with: None,
                fail_after_pages: HashMap::new(),
                requests: vec![],
            })),
        }
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock client whose fetches all fail.
    pub fn failing(error: UpstreamError) -> Self {
        let client = Self::new();
        client.state.lock().unwrap().fail_with = Some(error);
        client
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().unwrap().page_size = page_size.max(1);
        self
    }

    /// Replace the records served for `kind`. They must already be in
    /// non-decreasing cursor order.
    pub fn with_records(self, kind: StreamKind, records: Vec<RawRecord>) -> Self {
        self.state.lock().unwrap().records.insert(kind, records);
        self
    }

    /// Serve `pages` pages of `kind`, then fail with `error`.
    pub fn fail_after(self, kind: StreamKind, pages: usize, error: UpstreamError) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_after_pages
            .insert(kind, (pages, error));
        self
    }

    /// All fetches served so far.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_for(&self, kind: StreamKind) -> Vec<MockRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }
}

/// Keep a record unless its cursor is known to be before `min_cursor`.
fn at_or_after(
    registry: &Registry,
    kind: StreamKind,
    record: &RawRecord,
    min_cursor: &CursorValue,
) -> bool {
    let Some(stream) = registry.discover().iter().find(|s| s.kind == kind) else {
        return true;
    };
    match stream
        .cursor_source
        .read(record)
        .map(coerce_timestamp)
    {
        Some(Ok(Some(cursor))) => !min_cursor.is_after(&CursorValue::Text(cursor)),
        _ => true,
    }
}

impl UpstreamClient for MockClient {
    type Pages = StaticPages;

    fn fetch(
        &self,
        kind: StreamKind,
        min_cursor: &CursorValue,
        options: &FetchOptions,
    ) -> impl Future<Output = UpstreamResult<StaticPages>> + Send {
        let state = self.state.clone();
        let min_cursor = min_cursor.clone();
        let options = options.clone();
        async move {
            let registry = Registry::new().map_err(|e| UpstreamError::Init(e.to_string()))?;
            let mut state = state.lock().unwrap();

            state.requests.push(MockRequest {
                kind,
                min_cursor: min_cursor.clone(),
                options,
            });

            if let Some(ref error) = state.fail_with {
                return Err(error.clone());
            }

            let records: Vec<RawRecord> = state
                .records
                .get(&kind)
                .map(|records| {
                    records
                        .iter()
                        .filter(|r| at_or_after(&registry, kind, r, &min_cursor))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            let mut pages: Vec<Vec<RawRecord>> = records
                .chunks(state.page_size)
                .map(|chunk| chunk.to_vec())
                .collect();

            match state.fail_after_pages.get(&kind) {
                Some((served, error)) => {
                    pages.truncate(*served);
                    Ok(StaticPages::new(pages).then_fail(error.clone()))
                }
                None => Ok(StaticPages::new(pages)),
            }
        }
    }
}
