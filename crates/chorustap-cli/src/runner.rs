use std::future::Future;
use std::io::Write;

use anyhow::{Context, Result};
use chorustap_core::time::format_timestamp;
use chorustap_core::{CursorValue, StreamDefinition, UpstreamClient};
use chorustap_state::BookmarkStore;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::output::MessageWriter;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Flush bookmarks after this many emitted records within a stream.
    pub flush_every: u64,
    /// Stop after this many records across all streams.
    pub max_records: Option<u64>,
}

/// What happened to one stream during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub stream: String,
    pub records: u64,
    pub skipped: u64,
    /// Bookmark after the stream's final flush.
    pub bookmark: Option<CursorValue>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub streams: Vec<StreamOutcome>,
    /// Stopped by the record limit.
    pub limit_reached: bool,
    /// Stopped by a shutdown signal.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn failed(&self) -> Vec<&StreamOutcome> {
        self.streams.iter().filter(|s| s.error.is_some()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.streams.iter().all(|s| s.error.is_none())
    }

    pub fn total_records(&self) -> u64 {
        self.streams.iter().map(|s| s.records).sum()
    }
}

enum Stop {
    Exhausted,
    Limit,
    Interrupted,
    Failed(String),
}

/// Sync `streams` one after another.
///
/// Each emitted record advances its stream's bookmark before the next one is
/// pulled, so whenever the run stops the flushed bookmark is exactly the
/// cursor of the last emitted record. A stream that fails is recorded in the
/// summary and the run moves on; a failed flush aborts the run.
pub async fn run<C, S, W, F>(
    streams: &[&StreamDefinition],
    client: &C,
    store: &S,
    start_date: &CursorValue,
    options: RunOptions,
    output: &mut MessageWriter<W>,
    shutdown: F,
) -> Result<RunSummary>
where
    C: UpstreamClient,
    S: BookmarkStore + ?Sized,
    W: Write,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let flush_every = options.flush_every.max(1);
    let limit_hit = |total: u64| options.max_records.is_some_and(|max| total >= max);

    let mut summary = RunSummary::default();
    let mut total: u64 = 0;

    for &stream in streams {
        if limit_hit(total) {
            summary.limit_reached = true;
            break;
        }

        let start = store.starting_cursor(stream, start_date);
        info!(stream = %stream.name, start = %start, "Syncing stream");
        output
            .write_schema(stream)
            .context("Failed to write SCHEMA message")?;

        let mut extraction = stream.extract(client, start);
        let mut since_flush: u64 = 0;

        let stop = loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                next = extraction.next_record() => Some(next),
            };
            let Some(next) = next else {
                break Stop::Interrupted;
            };

            match next {
                Ok(Some(record)) => {
                    output
                        .write_record(&record, &format_timestamp(Utc::now()))
                        .context("Failed to write RECORD message")?;
                    store.advance(&stream.name, record.cursor.as_ref());

                    total += 1;
                    since_flush += 1;
                    if since_flush >= flush_every {
                        flush(store, output)?;
                        since_flush = 0;
                    }
                    if limit_hit(total) {
                        break Stop::Limit;
                    }
                }
                Ok(None) => break Stop::Exhausted,
                Err(e) => break Stop::Failed(e.to_string()),
            }
        };

        flush(store, output)?;

        let stats = extraction.stats();
        let mut outcome = StreamOutcome {
            stream: stream.name.clone(),
            records: stats.records_emitted,
            skipped: stats.records_skipped,
            bookmark: store.get(&stream.name),
            error: None,
        };

        match stop {
            Stop::Exhausted => {
                info!(
                    stream = %stream.name,
                    records = stats.records_emitted,
                    skipped = stats.records_skipped,
                    pages = stats.pages,
                    "Stream complete"
                );
            }
            Stop::Limit => {
                info!(stream = %stream.name, records = stats.records_emitted, "Record limit reached");
                summary.limit_reached = true;
            }
            Stop::Interrupted => {
                warn!(stream = %stream.name, records = stats.records_emitted, "Interrupted");
                summary.interrupted = true;
            }
            Stop::Failed(message) => {
                error!(
                    stream = %stream.name,
                    records = stats.records_emitted,
                    error = %message,
                    "Stream failed"
                );
                outcome.error = Some(message);
            }
        }

        summary.streams.push(outcome);
        if summary.limit_reached || summary.interrupted {
            break;
        }
    }

    Ok(summary)
}

fn flush<S, W>(store: &S, output: &mut MessageWriter<W>) -> Result<()>
where
    S: BookmarkStore + ?Sized,
    W: Write,
{
    store.flush().context("Failed to persist bookmarks")?;
    output
        .write_state(&store.bookmarks().snapshot())
        .context("Failed to write STATE message")?;
    debug!("Bookmarks flushed");
    Ok(())
}

/// Resolves on the first Ctrl-C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("Interrupt received, stopping after the current record"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await
        }
    }
}
