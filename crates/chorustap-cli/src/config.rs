use std::path::Path;

use anyhow::{Context, Result};
use chorustap_config::{StateBackend, StateSettings, TapConfig};
use chorustap_state::{BookmarkStore, FileStateStore, SqliteStateStore};

/// Read and parse the config file.
pub fn load_config(path: &Path) -> Result<TapConfig> {
    TapConfig::load(path).with_context(|| {
        format!(
            "Failed to load {}. Run 'chorustap init' to create one.",
            path.display()
        )
    })
}

/// Open the configured bookmark store.
pub fn open_store(settings: &StateSettings) -> Result<Box<dyn BookmarkStore>> {
    let path = &settings.path;
    let store: Box<dyn BookmarkStore> = match settings.backend {
        StateBackend::File => Box::new(
            FileStateStore::open(path)
                .with_context(|| format!("Failed to open state file {}", path.display()))?,
        ),
        StateBackend::Sqlite => Box::new(
            SqliteStateStore::open(path)
                .with_context(|| format!("Failed to open state database {}", path.display()))?,
        ),
    };
    Ok(store)
}
