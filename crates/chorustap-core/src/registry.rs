use std::collections::HashSet;

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::stream::StreamDefinition;
use crate::streams;

/// The set of streams this tap can extract, in a fixed order.
pub struct Registry {
    streams: Vec<StreamDefinition>,
}

impl Registry {
    /// Build the registry of all Chorus streams.
    ///
    /// Definitions are validated here, once, at startup.
    pub fn new() -> Result<Self> {
        Self::from_definitions(vec![
            streams::engagements()?,
            streams::scorecards()?,
            streams::emails()?,
        ])
    }

    /// Build a registry from explicit definitions. Stream names must be unique.
    pub fn from_definitions(streams: Vec<StreamDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for stream in &streams {
            if !seen.insert(stream.name.as_str()) {
                return Err(Error::InvalidDefinition {
                    stream: stream.name.clone(),
                    reason: "duplicate stream name".into(),
                });
            }
        }
        Ok(Self { streams })
    }

    /// All stream definitions, in extraction order.
    pub fn discover(&self) -> &[StreamDefinition] {
        &self.streams
    }

    pub fn get(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Restrict to the named streams, keeping registry order.
    /// An empty selection means every stream.
    pub fn select(&self, names: &[String]) -> Result<Vec<&StreamDefinition>> {
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(Error::UnknownStream(unknown.clone()));
        }

        Ok(self
            .streams
            .iter()
            .filter(|s| names.is_empty() || names.contains(&s.name))
            .collect())
    }

    /// Render a Singer-style catalog describing every stream.
    pub fn catalog(&self) -> Value {
        let streams: Vec<Value> = self
            .streams
            .iter()
            .map(|s| {
                json!({
                    "tap_stream_id": s.name,
                    "stream": s.name,
                    "key_properties": s.primary_keys,
                    "replication_key": s.replication_key,
                    "replication_method": "INCREMENTAL",
                    "schema": s.schema.to_json_schema(),
                })
            })
            .collect();

        json!({ "streams": streams })
    }
}
