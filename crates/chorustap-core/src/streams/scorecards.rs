use crate::error::Result;
use crate::schema::{Property, Schema, SchemaType};
use crate::stream::{CursorSource, StreamDefinition};
use crate::upstream::StreamKind;

/// Submitted call reviews. Records pass through unchanged apart from schema
/// conformance.
pub fn scorecards() -> Result<StreamDefinition> {
    StreamDefinition::builder("scorecards")
        .kind(StreamKind::Scorecards)
        .primary_keys(["id"])
        .replication_key("submitted")
        .cursor_source(CursorSource::field("submitted"))
        .schema(schema())
        .build()
}

fn person() -> SchemaType {
    SchemaType::object(vec![
        Property::new("name", SchemaType::String),
        Property::new("person_id", SchemaType::String),
        Property::new("user_id", SchemaType::String),
    ])
}

fn schema() -> Schema {
    Schema::new(vec![
        Property::new("id", SchemaType::String),
        Property::new("type", SchemaType::String),
        Property::new("submitted", SchemaType::DateTime),
        Property::new("url", SchemaType::String),
        Property::new("seen", SchemaType::Boolean),
        Property::new("engagement", SchemaType::String),
        Property::new(
            "initiative",
            SchemaType::object(vec![
                Property::new("description", SchemaType::String),
                Property::new("id", SchemaType::String),
                Property::new("name", SchemaType::String),
                Property::new("url", SchemaType::String),
            ]),
        ),
        Property::new("recipient", person()),
        Property::new("reviewer", person()),
        Property::new(
            "scores",
            SchemaType::array_of(SchemaType::object(vec![
                Property::new(
                    "comment",
                    SchemaType::object(vec![Property::new("text", SchemaType::String)]),
                ),
                Property::new(
                    "question",
                    SchemaType::object(vec![
                        Property::new("id", SchemaType::String),
                        Property::new("text", SchemaType::String),
                    ]),
                ),
                Property::new("score", SchemaType::Integer),
            ])),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scorecard_passes_through() {
        let stream = scorecards().unwrap();
        let raw = json!({
            "id": "sc-1",
            "type": "scorecard",
            "submitted": "2024-02-03T04:05:06Z",
            "seen": true,
            "reviewer": {"name": "Grace", "person_id": "p-9", "user_id": null},
            "scores": [
                {"comment": {"text": "good"}, "question": {"id": "q1", "text": "Intro?"}, "score": 4},
                {"comment": null, "question": {"id": "q2", "text": "Close?"}, "score": null}
            ]
        });

        let record = stream.normalize(raw.as_object().unwrap()).unwrap();

        assert_eq!(record.data["submitted"], json!("2024-02-03T04:05:06+00:00"));
        assert_eq!(record.data["scores"], raw["scores"]);
        assert_eq!(record.data["reviewer"], raw["reviewer"]);
        assert!(stream.schema.covers(&record.data));
    }
}
