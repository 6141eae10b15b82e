use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chorustap_client::ChorusClient;
use chorustap_core::Registry;
use colored::Colorize;
use tracing::info;

use crate::config::{load_config, open_store};
use crate::output::MessageWriter;
use crate::runner::{self, RunOptions, RunSummary};

pub async fn cmd_sync(
    config_path: &Path,
    streams: Vec<String>,
    max_records: Option<u64>,
    state_path: Option<PathBuf>,
) -> Result<()> {
    let registry = Registry::new()?;
    let config = load_config(config_path)?;
    let mut settings = chorustap_config::validate(&config, &registry)
        .with_context(|| format!("Invalid config in {}", config_path.display()))?;

    if !streams.is_empty() {
        settings.streams = streams;
    }
    if let Some(path) = state_path {
        settings.state.path = path;
    }

    let selected = registry.select(&settings.streams)?;
    let client = ChorusClient::new(&settings.auth_token, &settings.api_url)?;
    let store = open_store(&settings.state)?;

    info!(
        streams = selected.len(),
        state = %settings.state.path.display(),
        flush_every = settings.state.flush_every,
        "Starting sync"
    );

    let mut output = MessageWriter::new(io::stdout().lock());
    let summary = runner::run(
        &selected,
        &client,
        store.as_ref(),
        &settings.start_date,
        RunOptions {
            flush_every: settings.state.flush_every,
            max_records,
        },
        &mut output,
        runner::shutdown_signal(),
    )
    .await?;

    info!(
        records = summary.total_records(),
        messages = output.written(),
        "Sync finished"
    );
    print_summary(&summary);

    if !summary.is_success() {
        let failed = summary.failed();
        let names: Vec<&str> = failed.iter().map(|s| s.stream.as_str()).collect();
        anyhow::bail!("{} stream(s) failed: {}", failed.len(), names.join(", "));
    }
    Ok(())
}

/// Stdout carries the message stream, so the summary goes to stderr.
fn print_summary(summary: &RunSummary) {
    eprintln!("\n{}", "Sync Summary:".bold());
    eprintln!("{:<15} {:>10} {:>10}  {}", "Stream", "Records", "Skipped", "Bookmark");
    eprintln!("{:-<72}", "");

    for outcome in &summary.streams {
        let bookmark = outcome
            .bookmark
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".into());
        let line = format!(
            "{:<15} {:>10} {:>10}  {}",
            outcome.stream, outcome.records, outcome.skipped, bookmark
        );
        match &outcome.error {
            Some(error) => eprintln!("{}\n  {}", line.red(), error.red()),
            None => eprintln!("{}", line),
        }
    }

    if summary.interrupted {
        eprintln!("\n{}", "Interrupted; bookmarks saved at the last emitted record.".yellow());
    } else if summary.limit_reached {
        eprintln!("\n{}", "Record limit reached; run again to continue.".yellow());
    }
    eprintln!();
}
