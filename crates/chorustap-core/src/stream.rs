use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::normalize::{coerce_timestamp, conform};
use crate::schema::{Schema, SchemaType};
use crate::types::{CursorValue, RawRecord, Record};
use crate::upstream::{FetchOptions, PageSource, StreamKind, UpstreamClient};

/// Where the replication cursor lives in a raw upstream record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorSource {
    /// A top-level field of the raw record.
    Field(String),
    /// A field inside nested objects, e.g. `email.sent_time`.
    Path(Vec<String>),
}

impl CursorSource {
    pub fn field(name: impl Into<String>) -> Self {
        CursorSource::Field(name.into())
    }

    pub fn path<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CursorSource::Path(segments.into_iter().map(Into::into).collect())
    }

    /// Read the raw cursor value. Missing intermediate objects read as absent.
    pub fn read<'a>(&self, raw: &'a RawRecord) -> Option<&'a Value> {
        match self {
            CursorSource::Field(name) => raw.get(name),
            CursorSource::Path(segments) => {
                let (first, rest) = segments.split_first()?;
                let mut current = raw.get(first)?;
                for segment in rest {
                    current = current.as_object()?.get(segment)?;
                }
                Some(current)
            }
        }
    }

    /// Dotted path for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            CursorSource::Field(name) => name.clone(),
            CursorSource::Path(segments) => segments.join("."),
        }
    }
}

/// Declaration of one record stream.
#[derive(Debug, Clone)]
pub struct StreamDefinition {
    /// Unique stream name.
    pub name: String,
    /// Upstream collection this stream pulls.
    pub kind: StreamKind,
    /// Fields identifying a record within the stream.
    pub primary_keys: Vec<String>,
    /// Top-level field holding the incremental cursor.
    pub replication_key: String,
    pub schema: Schema,
    /// Where the cursor is read from in the raw payload.
    pub cursor_source: CursorSource,
    /// Stream-specific request flags.
    pub options: FetchOptions,
}

impl StreamDefinition {
    pub fn builder(name: impl Into<String>) -> StreamDefinitionBuilder {
        StreamDefinitionBuilder::new(name)
    }

    /// The cursor the next pull starts from: the stored bookmark, or the
    /// configured start date when the stream has never been bookmarked.
    pub fn starting_cursor(&self, bookmark: Option<CursorValue>, start_date: &CursorValue) -> CursorValue {
        match bookmark {
            Some(cursor) => cursor,
            None => {
                debug!(stream = %self.name, start_date = %start_date, "No bookmark, using start date");
                start_date.clone()
            }
        }
    }

    /// Normalize one raw record into the declared schema.
    ///
    /// A null or absent cursor is not an error: the record is returned with a
    /// null replication key and no cursor. A cursor that is present but
    /// cannot be interpreted is a `CursorViolation`.
    pub fn normalize(&self, raw: &RawRecord) -> Result<Record> {
        let cursor = match self.cursor_source.read(raw) {
            None => None,
            Some(value) => coerce_timestamp(value).map_err(|reason| Error::CursorViolation {
                stream: self.name.clone(),
                field: self.cursor_source.describe(),
                reason,
            })?,
        };

        let mut data = conform(&self.name, &self.schema, raw)?;

        for key in &self.primary_keys {
            if data.get(key).map_or(true, Value::is_null) {
                return Err(Error::SchemaViolation {
                    stream: self.name.clone(),
                    field: key.clone(),
                    reason: "missing primary key".into(),
                });
            }
        }

        data.insert(
            self.replication_key.clone(),
            cursor.clone().map_or(Value::Null, Value::String),
        );

        Ok(Record {
            stream: self.name.clone(),
            data,
            cursor: cursor.map(CursorValue::Text),
        })
    }

    /// Start a lazy extraction of records at or after `min_cursor`.
    ///
    /// Nothing is fetched until the first call to `Extraction::next_record`.
    pub fn extract<'a, C: UpstreamClient>(
        &'a self,
        client: &'a C,
        min_cursor: CursorValue,
    ) -> Extraction<'a, C> {
        Extraction {
            stream: self,
            client,
            min_cursor,
            pages: None,
            buffer: VecDeque::new(),
            finished: false,
            stats: ExtractionStats::default(),
        }
    }
}

/// Builder for constructing a StreamDefinition.
pub struct StreamDefinitionBuilder {
    name: String,
    kind: Option<StreamKind>,
    primary_keys: Vec<String>,
    replication_key: Option<String>,
    schema: Schema,
    cursor_source: Option<CursorSource>,
    options: FetchOptions,
}

impl StreamDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            primary_keys: vec![],
            replication_key: None,
            schema: Schema::default(),
            cursor_source: None,
            options: FetchOptions::default(),
        }
    }

    pub fn kind(mut self, kind: StreamKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn primary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn replication_key(mut self, key: impl Into<String>) -> Self {
        self.replication_key = Some(key.into());
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn cursor_source(mut self, source: CursorSource) -> Self {
        self.cursor_source = Some(source);
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.flag(name, value);
        self
    }

    /// Build and validate the definition.
    pub fn build(self) -> Result<StreamDefinition> {
        let invalid = |reason: String| Error::InvalidDefinition {
            stream: self.name.clone(),
            reason,
        };

        if self.name.is_empty() {
            return Err(invalid("stream name is empty".into()));
        }
        let kind = self.kind.ok_or_else(|| invalid("missing kind".into()))?;
        let replication_key = self
            .replication_key
            .clone()
            .ok_or_else(|| invalid("missing replication key".into()))?;

        self.schema.validate().map_err(&invalid)?;

        match self.schema.get(&replication_key) {
            Some(prop) if prop.kind == SchemaType::DateTime => {}
            Some(prop) => {
                return Err(invalid(format!(
                    "replication key '{}' must be date-time, found {}",
                    replication_key,
                    prop.kind.type_name()
                )))
            }
            None => {
                return Err(invalid(format!(
                    "replication key '{}' not declared in schema",
                    replication_key
                )))
            }
        }

        if self.primary_keys.is_empty() {
            return Err(invalid("no primary keys".into()));
        }
        if let Some(key) = self
            .primary_keys
            .iter()
            .find(|k| self.schema.get(k).is_none())
        {
            return Err(invalid(format!("primary key '{}' not declared in schema", key)));
        }

        let cursor_source = self
            .cursor_source
            .clone()
            .unwrap_or_else(|| CursorSource::Field(replication_key.clone()));

        Ok(StreamDefinition {
            name: self.name,
            kind,
            primary_keys: self.primary_keys,
            replication_key,
            schema: self.schema,
            cursor_source,
            options: self.options,
        })
    }
}

/// Counters for one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub pages: u64,
    pub records_emitted: u64,
    pub records_skipped: u64,
    /// Emitted records that carried no cursor.
    pub records_without_cursor: u64,
}

/// A lazy pull of normalized records for one stream.
///
/// The only suspension point is the upstream page fetch. Records already
/// returned are never replayed, and the extraction never touches bookmark
/// state: callers advance their bookmark from each returned record's cursor.
pub struct Extraction<'a, C: UpstreamClient> {
    stream: &'a StreamDefinition,
    client: &'a C,
    min_cursor: CursorValue,
    pages: Option<C::Pages>,
    buffer: VecDeque<RawRecord>,
    finished: bool,
    stats: ExtractionStats,
}

impl<'a, C: UpstreamClient> Extraction<'a, C> {
    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }

    /// Yield the next normalized record, or `None` once upstream is exhausted.
    ///
    /// Records failing schema checks on non-cursor fields are logged and
    /// skipped. Upstream failures and unresolvable cursors end the extraction
    /// with an error.
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            if let Some(raw) = self.buffer.pop_front() {
                match self.stream.normalize(&raw) {
                    Ok(record) => {
                        self.stats.records_emitted += 1;
                        if record.cursor.is_none() {
                            self.stats.records_without_cursor += 1;
                            warn!(
                                stream = %self.stream.name,
                                field = %self.stream.cursor_source.describe(),
                                "Record has no cursor value; emitting without advancing bookmark"
                            );
                        }
                        return Ok(Some(record));
                    }
                    Err(e) if !e.is_fatal_for_stream() => {
                        self.stats.records_skipped += 1;
                        warn!(stream = %self.stream.name, error = %e, "Skipping record");
                        continue;
                    }
                    Err(e) => {
                        self.finished = true;
                        return Err(e);
                    }
                }
            }

            match self.fetch_page().await {
                Ok(Some(page)) => {
                    self.stats.pages += 1;
                    debug!(
                        stream = %self.stream.name,
                        page = self.stats.pages,
                        records = page.len(),
                        "Fetched page"
                    );
                    self.buffer.extend(page);
                }
                Ok(None) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_page(&mut self) -> Result<Option<Vec<RawRecord>>> {
        if self.pages.is_none() {
            debug!(
                stream = %self.stream.name,
                min_cursor = %self.min_cursor,
                "Starting upstream fetch"
            );
            let pages = self
                .client
                .fetch(self.stream.kind, &self.min_cursor, &self.stream.options)
                .await?;
            self.pages = Some(pages);
        }

        match self.pages.as_mut() {
            Some(pages) => Ok(pages.next_page().await?),
            None => Ok(None),
        }
    }
}
