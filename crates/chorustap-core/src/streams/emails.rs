use crate::error::Result;
use crate::schema::{Property, Schema, SchemaType};
use crate::stream::{CursorSource, StreamDefinition};
use crate::upstream::StreamKind;

use super::participant;

/// Tracked emails. The send time only exists inside the nested `email`
/// object and is surfaced as the top-level `sent_time`.
pub fn emails() -> Result<StreamDefinition> {
    StreamDefinition::builder("emails")
        .kind(StreamKind::Emails)
        .primary_keys(["id"])
        .replication_key("sent_time")
        .cursor_source(CursorSource::path(["email", "sent_time"]))
        .schema(schema())
        .build()
}

fn contact() -> Vec<Property> {
    vec![
        Property::new("email", SchemaType::String),
        Property::new("name", SchemaType::String),
    ]
}

fn schema() -> Schema {
    let mut owner = contact();
    owner.push(Property::new("person_id", SchemaType::String));
    owner.push(Property::new("user_id", SchemaType::String));

    Schema::new(vec![
        Property::new("id", SchemaType::String),
        Property::new("type", SchemaType::String),
        Property::new("status", SchemaType::String),
        Property::new("sent_time", SchemaType::DateTime),
        Property::new("name", SchemaType::String),
        Property::new("private", SchemaType::Boolean),
        Property::new("company_name", SchemaType::String),
        Property::new(
            "account",
            SchemaType::object(vec![
                Property::new("ext_id", SchemaType::String),
                Property::new("id", SchemaType::String),
                Property::new("name", SchemaType::String),
                Property::new("type", SchemaType::String),
            ]),
        ),
        Property::new(
            "email",
            SchemaType::object(vec![
                Property::new("body", SchemaType::String),
                Property::new("initiator", SchemaType::object(contact())),
                Property::new("thread", SchemaType::String),
            ]),
        ),
        Property::new(
            "deal",
            SchemaType::object(vec![
                Property::new("close_date", SchemaType::DateTime),
                Property::new("current_stage", SchemaType::String),
                Property::new("id", SchemaType::String),
                Property::new("initial_stage", SchemaType::String),
                Property::new("name", SchemaType::String),
                Property::new("on_stage_since", SchemaType::DateTime),
                Property::new("size", SchemaType::String),
            ]),
        ),
        Property::new("owner", SchemaType::object(owner)),
        Property::new("participants", SchemaType::array_of(participant())),
    ])
}
