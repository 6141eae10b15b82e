mod bookmarks;
mod error;
mod file;
mod memory;
mod sqlite;

use chorustap_core::{CursorValue, StreamDefinition};

pub use bookmarks::{Bookmarks, FlushPlan};
pub use error::{StateError, StateResult};
pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

/// Trait for bookmark storage backends.
///
/// Backends hold bookmarks in memory and only touch durable storage on
/// `flush`. Several stores may share one persisted state, so `persist` merges
/// into it rather than overwriting it, and must do so atomically.
pub trait BookmarkStore: Send + Sync {
    /// In-memory bookmarks for this store.
    fn bookmarks(&self) -> &Bookmarks;

    /// Durably merge `plan` into the persisted state (see `FlushPlan::merge`).
    fn persist(&self, plan: &FlushPlan) -> StateResult<()>;

    /// Get the bookmark for a stream.
    fn get(&self, stream: &str) -> Option<CursorValue> {
        self.bookmarks().get(stream)
    }

    /// Move a stream's bookmark to `candidate` if it is strictly later.
    /// Returns true when the bookmark moved.
    fn advance(&self, stream: &str, candidate: Option<&CursorValue>) -> bool {
        self.bookmarks().advance(stream, candidate)
    }

    /// Persist the current bookmarks.
    fn flush(&self) -> StateResult<()> {
        let bookmarks = self.bookmarks();
        let _guard = bookmarks.flush_guard();
        let plan = bookmarks.plan();
        self.persist(&plan)?;
        bookmarks.settle(&plan);
        Ok(())
    }

    /// All bookmarks, ordered by stream name.
    fn all(&self) -> Vec<(String, CursorValue)> {
        self.bookmarks().snapshot().into_iter().collect()
    }

    /// Forget a stream's bookmark. Takes effect on disk at the next flush.
    fn reset(&self, stream: &str) -> bool {
        self.bookmarks().remove(stream)
    }

    /// Forget every bookmark. Takes effect on disk at the next flush.
    fn reset_all(&self) {
        self.bookmarks().clear()
    }

    /// The cursor `stream` should resume from.
    fn starting_cursor(&self, stream: &StreamDefinition, start_date: &CursorValue) -> CursorValue {
        stream.starting_cursor(self.get(&stream.name), start_date)
    }
}
