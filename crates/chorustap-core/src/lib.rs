pub mod error;
pub mod normalize;
pub mod registry;
pub mod schema;
pub mod stream;
pub mod streams;
pub mod time;
pub mod types;
pub mod upstream;

pub use error::{Error, Result};
pub use normalize::{coerce_timestamp, conform};
pub use registry::Registry;
pub use schema::{Property, Schema, SchemaType};
pub use stream::{CursorSource, Extraction, ExtractionStats, StreamDefinition, StreamDefinitionBuilder};
pub use types::{CursorValue, RawRecord, Record};
pub use upstream::{
    FetchOptions, PageSource, StaticPages, StreamKind, UpstreamClient, UpstreamError,
    UpstreamResult, DEFAULT_API_URL,
};
