use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use chorustap_core::CursorValue;
use tracing::debug;

/// Per-stream high-water marks held in memory.
///
/// `advance` is a monotonic max: it is idempotent and commutative, so stale
/// or repeated candidates never move a bookmark backwards.
#[derive(Debug, Default)]
pub struct Bookmarks {
    entries: Mutex<Entries>,
    flush_lock: Mutex<()>,
}

#[derive(Debug, Default)]
struct Entries {
    values: BTreeMap<String, CursorValue>,
    removed: BTreeSet<String>,
    cleared: bool,
}

/// What a flush writes: the in-memory bookmarks plus the resets made since
/// the last successful flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushPlan {
    pub bookmarks: BTreeMap<String, CursorValue>,
    /// Streams reset since the last successful flush.
    pub removed: BTreeSet<String>,
    /// Every bookmark was reset since the last successful flush.
    pub cleared: bool,
}

impl FlushPlan {
    /// Merge this plan into the currently persisted bookmarks.
    ///
    /// Persisted entries survive unless they were reset here, and a persisted
    /// cursor later than ours is kept.
    pub fn merge(
        &self,
        mut persisted: BTreeMap<String, CursorValue>,
    ) -> BTreeMap<String, CursorValue> {
        if self.cleared {
            persisted.clear();
        }
        for stream in &self.removed {
            persisted.remove(stream);
        }

        for (stream, cursor) in &self.bookmarks {
            match persisted.get(stream) {
                Some(current) if current.is_after(cursor) => {
                    debug!(
                        stream,
                        persisted = %current,
                        ours = %cursor,
                        "Keeping later persisted bookmark"
                    );
                }
                _ => {
                    persisted.insert(stream.clone(), cursor.clone());
                }
            }
        }
        persisted
    }
}

impl Bookmarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from previously persisted state.
    pub fn from_entries(values: BTreeMap<String, CursorValue>) -> Self {
        Self {
            entries: Mutex::new(Entries {
                values,
                ..Entries::default()
            }),
            flush_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, stream: &str) -> Option<CursorValue> {
        self.entries.lock().unwrap().values.get(stream).cloned()
    }

    /// Raise the bookmark to `candidate` when it is strictly later.
    ///
    /// Absent candidates and candidates not comparable with the current value
    /// are ignored.
    pub fn advance(&self, stream: &str, candidate: Option<&CursorValue>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };

        let mut entries = self.entries.lock().unwrap();
        let moved = match entries.values.get(stream) {
            Some(current) => candidate.is_after(current),
            None => true,
        };

        if moved {
            debug!(stream, cursor = %candidate, "Bookmark advanced");
            entries.values.insert(stream.to_string(), candidate.clone());
        }
        moved
    }

    /// Forget a stream's bookmark, here and at the next flush.
    pub fn remove(&self, stream: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        entries.removed.insert(stream.to_string());
        entries.values.remove(stream).is_some()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.values.clear();
        entries.removed.clear();
        entries.cleared = true;
    }

    pub fn snapshot(&self) -> BTreeMap<String, CursorValue> {
        self.entries.lock().unwrap().values.clone()
    }

    pub fn plan(&self) -> FlushPlan {
        let entries = self.entries.lock().unwrap();
        FlushPlan {
            bookmarks: entries.values.clone(),
            removed: entries.removed.clone(),
            cleared: entries.cleared,
        }
    }

    /// Drop the resets `plan` carried once it has been persisted.
    pub fn settle(&self, plan: &FlushPlan) {
        let mut entries = self.entries.lock().unwrap();
        for stream in &plan.removed {
            entries.removed.remove(stream);
        }
        if plan.cleared {
            entries.cleared = false;
        }
    }

    /// Serializes flushes so an older snapshot never overwrites a newer one.
    pub fn flush_guard(&self) -> MutexGuard<'_, ()> {
        self.flush_lock.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ts(s: &str) -> CursorValue {
        CursorValue::text(s)
    }

    #[test]
    fn test_advance_is_max_regardless_of_order() {
        let candidates = [
            ts("2024-01-03T00:00:00Z"),
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-05T00:00:00+00:00"),
            ts("2024-01-02T00:00:00Z"),
        ];

        let forward = Bookmarks::new();
        for c in &candidates {
            forward.advance("s", Some(c));
        }

        let backward = Bookmarks::new();
        for c in candidates.iter().rev() {
            backward.advance("s", Some(c));
        }

        assert_eq!(forward.get("s"), Some(ts("2024-01-05T00:00:00+00:00")));
        assert_eq!(forward.get("s"), backward.get("s"));
    }

    #[test]
    fn test_advance_never_regresses_below_initial() {
        let mut initial = BTreeMap::new();
        initial.insert("s".to_string(), ts("2024-06-01T00:00:00Z"));
        let bookmarks = Bookmarks::from_entries(initial);

        assert!(!bookmarks.advance("s", Some(&ts("2024-05-01T00:00:00Z"))));
        assert!(!bookmarks.advance("s", Some(&ts("2024-06-01T00:00:00+00:00"))));
        assert!(!bookmarks.advance("s", None));
        assert_eq!(bookmarks.get("s"), Some(ts("2024-06-01T00:00:00Z")));

        assert!(bookmarks.advance("s", Some(&ts("2024-06-02T00:00:00Z"))));
    }

    #[test]
    fn test_incomparable_candidate_ignored() {
        let bookmarks = Bookmarks::new();
        bookmarks.advance("s", Some(&ts("2024-01-01T00:00:00Z")));
        assert!(!bookmarks.advance("s", Some(&CursorValue::Integer(99))));
        assert_eq!(bookmarks.get("s"), Some(ts("2024-01-01T00:00:00Z")));
    }

    #[test]
    fn test_streams_are_independent() {
        let bookmarks = Bookmarks::new();
        bookmarks.advance("a", Some(&ts("2024-01-02T00:00:00Z")));
        bookmarks.advance("b", Some(&ts("2024-01-01T00:00:00Z")));

        assert!(bookmarks.remove("a"));
        assert!(!bookmarks.remove("a"));
        assert_eq!(bookmarks.get("a"), None);
        assert_eq!(bookmarks.get("b"), Some(ts("2024-01-01T00:00:00Z")));
    }

    #[test]
    fn test_concurrent_advance() {
        let bookmarks = Arc::new(Bookmarks::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let bookmarks = Arc::clone(&bookmarks);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        bookmarks.advance("s", Some(&CursorValue::Integer(t * 1000 + i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(bookmarks.get("s"), Some(CursorValue::Integer(7099)));
    }

    #[test]
    fn test_merge_keeps_later_persisted_cursor() {
        let bookmarks = Bookmarks::new();
        bookmarks.advance("emails", Some(&ts("2024-01-01T00:00:00Z")));
        bookmarks.advance("scorecards", Some(&ts("2024-03-01T00:00:00Z")));

        let mut persisted = BTreeMap::new();
        persisted.insert("emails".to_string(), ts("2024-06-01T00:00:00Z"));
        persisted.insert("scorecards".to_string(), ts("2024-02-01T00:00:00Z"));
        persisted.insert("engagements".to_string(), ts("2024-05-01T00:00:00Z"));

        let merged = bookmarks.plan().merge(persisted);
        assert_eq!(merged.get("emails"), Some(&ts("2024-06-01T00:00:00Z")));
        assert_eq!(merged.get("scorecards"), Some(&ts("2024-03-01T00:00:00Z")));
        assert_eq!(merged.get("engagements"), Some(&ts("2024-05-01T00:00:00Z")));
    }

    #[test]
    fn test_merge_applies_resets_until_settled() {
        let mut persisted = BTreeMap::new();
        persisted.insert("emails".to_string(), ts("2024-06-01T00:00:00Z"));
        persisted.insert("scorecards".to_string(), ts("2024-02-01T00:00:00Z"));
        let bookmarks = Bookmarks::from_entries(persisted.clone());

        bookmarks.remove("emails");
        let plan = bookmarks.plan();
        assert_eq!(plan.removed, BTreeSet::from(["emails".to_string()]));
        let merged = plan.merge(persisted.clone());
        assert!(!merged.contains_key("emails"));
        assert!(merged.contains_key("scorecards"));

        bookmarks.settle(&plan);
        assert!(bookmarks.plan().removed.is_empty());

        bookmarks.clear();
        bookmarks.advance("emails", Some(&ts("2024-01-01T00:00:00Z")));
        let plan = bookmarks.plan();
        assert!(plan.cleared);
        let merged = plan.merge(persisted);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("emails"), Some(&ts("2024-01-01T00:00:00Z")));

        bookmarks.settle(&plan);
        assert!(!bookmarks.plan().cleared);
    }
}
