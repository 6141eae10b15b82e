use std::fmt::Write;
use std::path::Path;

use anyhow::Result;
use chorustap_core::{CursorValue, Registry};

use crate::config::{load_config, open_store};

pub fn cmd_status(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let settings = chorustap_config::state_settings(&config)?;
    let registry = Registry::new()?;
    let store = open_store(&settings)?;

    let bookmarks = store.all();
    if bookmarks.is_empty() {
        println!(
            "No bookmarks in {}. Run 'chorustap sync' to start syncing.",
            settings.path.display()
        );
        return Ok(());
    }

    print!("{}", render_status(&registry, &bookmarks));
    Ok(())
}

/// One row per known stream, then any bookmarks for streams no longer known.
fn render_status(registry: &Registry, bookmarks: &[(String, CursorValue)]) -> String {
    let lookup = |name: &str| {
        bookmarks
            .iter()
            .find(|(stream, _)| stream == name)
            .map(|(_, cursor)| cursor.to_string())
    };

    let mut out = String::new();
    let _ = writeln!(out, "\nSync Status:");
    let _ = writeln!(out, "{:<15} {:<15} {:>32}", "Stream", "Key", "Bookmark");
    let _ = writeln!(out, "{:-<64}", "");

    for stream in registry.discover() {
        let _ = writeln!(
            out,
            "{:<15} {:<15} {:>32}",
            stream.name,
            stream.replication_key,
            lookup(&stream.name).unwrap_or_else(|| "-".into())
        );
    }
    for (name, cursor) in bookmarks {
        if registry.get(name).is_none() {
            let _ = writeln!(out, "{:<15} {:<15} {:>32}", name, "(unknown)", cursor.to_string());
        }
    }

    let _ = writeln!(out);
    out
}
