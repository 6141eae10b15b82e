use std::path::Path;

use anyhow::{Context, Result};
use chorustap_core::Registry;
use colored::Colorize;
use tracing::info;

use crate::config::{load_config, open_store};

pub fn cmd_reset(config_path: &Path, stream: Option<&str>, all: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let settings = chorustap_config::state_settings(&config)?;
    let store = open_store(&settings)?;

    if all {
        store.reset_all();
        store.flush().context("Failed to persist bookmarks")?;
        info!(path = %settings.path.display(), "All bookmarks reset");
        println!("{}", "All bookmarks reset.".green());
        return Ok(());
    }

    let Some(stream) = stream else {
        anyhow::bail!("Specify a stream or --all");
    };
    if Registry::new()?.get(stream).is_none() && store.get(stream).is_none() {
        anyhow::bail!("Unknown stream '{}'", stream);
    }

    if store.reset(stream) {
        store.flush().context("Failed to persist bookmarks")?;
        info!(stream, "Bookmark reset");
        println!("{}", format!("Bookmark for '{}' reset.", stream).green());
    } else {
        println!("No bookmark for '{}', nothing to reset.", stream);
    }
    Ok(())
}
