use crate::error::Result;
use crate::schema::{Property, Schema, SchemaType};
use crate::stream::{CursorSource, StreamDefinition};
use crate::upstream::StreamKind;

use super::participant;

/// Calls and meetings. Upstream sends `date_time` as epoch seconds.
pub fn engagements() -> Result<StreamDefinition> {
    StreamDefinition::builder("engagements")
        .kind(StreamKind::Engagements)
        .primary_keys(["engagement_id"])
        .replication_key("date_time")
        .cursor_source(CursorSource::field("date_time"))
        .option("with_trackers", "true")
        .schema(schema())
        .build()
}

fn schema() -> Schema {
    Schema::new(vec![
        Property::new("name", SchemaType::String),
        Property::new("account_id", SchemaType::String)
            .describe("Account ID of engagement participant"),
        Property::new("account_name", SchemaType::String)
            .describe("Account Name of engagement participant"),
        Property::new("compliance", SchemaType::String).describe("Compliance details"),
        Property::new("date_time", SchemaType::DateTime),
        Property::new("disposition_connected", SchemaType::String),
        Property::new("disposition_gatekeeper", SchemaType::String),
        Property::new("disposition_tree", SchemaType::String),
        Property::new("disposition_voicemail", SchemaType::String),
        Property::new("duration", SchemaType::Number),
        Property::new("engagement_id", SchemaType::String),
        Property::new("engagement_type", SchemaType::String),
        Property::new("initiator", SchemaType::String),
        Property::new("language", SchemaType::String),
        Property::new("no_show", SchemaType::Boolean),
        Property::new("num_cust_questions", SchemaType::Integer),
        Property::new("num_engaging_questions", SchemaType::Integer),
        Property::new("opportunity_id", SchemaType::String),
        Property::new("opportunity_name", SchemaType::String),
        Property::new("participants", SchemaType::array_of(participant())),
        Property::new("processing_state", SchemaType::String),
        Property::new("subject", SchemaType::String),
        Property::new(
            "tracker_matches",
            SchemaType::array_of(SchemaType::object(vec![
                Property::new("name", SchemaType::String),
                Property::new("num_matches", SchemaType::Integer),
                Property::new("type", SchemaType::String),
            ])),
        ),
        Property::new("url", SchemaType::String),
        Property::new("user_email", SchemaType::String),
        Property::new("user_id", SchemaType::String),
        Property::new("user_name", SchemaType::String),
    ])
}
