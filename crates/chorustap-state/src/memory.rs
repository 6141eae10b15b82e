use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chorustap_core::CursorValue;

use crate::error::{StateError, StateResult};
use crate::{BookmarkStore, Bookmarks, FlushPlan};

/// A state store that keeps its "persisted" copy in memory (for testing).
#[derive(Default)]
pub struct MemoryStateStore {
    bookmarks: Bookmarks,
    persisted: Mutex<BTreeMap<String, CursorValue>>,
    flushes: AtomicUsize,
    fail_flush: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with existing bookmarks.
    pub fn with_bookmarks<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, CursorValue)>,
        S: Into<String>,
    {
        let entries: BTreeMap<String, CursorValue> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            bookmarks: Bookmarks::from_entries(entries.clone()),
            persisted: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Make subsequent flushes fail (or succeed again).
    pub fn set_fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// The last successfully flushed state.
    pub fn persisted(&self) -> BTreeMap<String, CursorValue> {
        self.persisted.lock().unwrap().clone()
    }

    /// Number of successful flushes.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl BookmarkStore for MemoryStateStore {
    fn bookmarks(&self) -> &Bookmarks {
        &self.bookmarks
    }

    fn persist(&self, plan: &FlushPlan) -> StateResult<()> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(StateError::Io(std::io::Error::other("simulated flush failure")));
        }
        let mut persisted = self.persisted.lock().unwrap();
        *persisted = plan.merge(std::mem::take(&mut *persisted));
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
