//! Singer message output: one JSON document per line.

use std::collections::BTreeMap;
use std::io::{self, Write};

use chorustap_core::{CursorValue, Record, StreamDefinition};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
enum Message<'a> {
    Schema {
        stream: &'a str,
        schema: Value,
        key_properties: &'a [String],
        bookmark_properties: [&'a str; 1],
    },
    Record {
        stream: &'a str,
        record: &'a serde_json::Map<String, Value>,
        time_extracted: &'a str,
    },
    State {
        value: Value,
    },
}

/// Writes Singer messages to any `io::Write`.
pub struct MessageWriter<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn write_schema(&mut self, stream: &StreamDefinition) -> io::Result<()> {
        self.write(&Message::Schema {
            stream: &stream.name,
            schema: stream.schema.to_json_schema(),
            key_properties: &stream.primary_keys,
            bookmark_properties: [stream.replication_key.as_str()],
        })
    }

    pub fn write_record(&mut self, record: &Record, time_extracted: &str) -> io::Result<()> {
        self.write(&Message::Record {
            stream: &record.stream,
            record: &record.data,
            time_extracted,
        })
    }

    /// Emit the bookmarks as a STATE message and flush the sink.
    pub fn write_state(&mut self, bookmarks: &BTreeMap<String, CursorValue>) -> io::Result<()> {
        self.write(&Message::State {
            value: state_value(bookmarks),
        })?;
        self.out.flush()
    }

    /// Number of messages written.
    pub fn written(&self) -> u64 {
        self.written
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, message: &Message<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}

/// Singer state document for a set of bookmarks.
pub fn state_value(bookmarks: &BTreeMap<String, CursorValue>) -> Value {
    let bookmarks: serde_json::Map<String, Value> = bookmarks
        .iter()
        .map(|(stream, cursor)| {
            (
                stream.clone(),
                json!({ "replication_key_value": cursor.to_json() }),
            )
        })
        .collect();
    json!({ "bookmarks": bookmarks })
}
