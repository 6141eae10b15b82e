//! JSON state file in the Singer layout:
//! `{"bookmarks": {"<stream>": {"replication_key_value": ...}}}`.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chorustap_core::CursorValue;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::StateResult;
use crate::{BookmarkStore, Bookmarks, FlushPlan};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    bookmarks: BTreeMap<String, BookmarkEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BookmarkEntry {
    /// Absent in entries that only carry other Singer fields.
    #[serde(default)]
    replication_key_value: Option<CursorValue>,
}

/// File-backed state store.
pub struct FileStateStore {
    path: PathBuf,
    bookmarks: Bookmarks,
}

impl FileStateStore {
    /// Open the state file at `path`. A missing or empty file is an empty state.
    pub fn open(path: impl AsRef<Path>) -> StateResult<Self> {
        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), "Opening state file");

        let entries = read_bookmarks(&path)?;
        Ok(Self {
            path,
            bookmarks: Bookmarks::from_entries(entries),
        })
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

fn read_bookmarks(path: &Path) -> StateResult<BTreeMap<String, CursorValue>> {
    let state = match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => StateFile::default(),
        Ok(content) => serde_json::from_str(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateFile::default(),
        Err(e) => return Err(e.into()),
    };

    Ok(state
        .bookmarks
        .into_iter()
        .filter_map(|(stream, entry)| Some((stream, entry.replication_key_value?)))
        .collect())
}

impl BookmarkStore for FileStateStore {
    fn bookmarks(&self) -> &Bookmarks {
        &self.bookmarks
    }

    fn persist(&self, plan: &FlushPlan) -> StateResult<()> {
        // Re-read so entries flushed by other processes since open survive.
        let merged = plan.merge(read_bookmarks(&self.path)?);
        let state = StateFile {
            bookmarks: merged
                .iter()
                .map(|(stream, value)| {
                    (
                        stream.clone(),
                        BookmarkEntry {
                            replication_key_value: Some(value.clone()),
                        },
                    )
                })
                .collect(),
        };
        let content = serde_json::to_vec_pretty(&state)?;

        // Write next to the target so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(self.directory())?;
        tmp.write_all(&content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), streams = merged.len(), "State flushed");
        Ok(())
    }
}
