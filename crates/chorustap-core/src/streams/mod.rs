//! Static definitions of the Chorus record streams.

mod emails;
mod engagements;
mod scorecards;

pub use emails::emails;
pub use engagements::engagements;
pub use scorecards::scorecards;

use crate::schema::{Property, SchemaType};

/// Person reference shared by engagement and email participant lists.
fn participant() -> SchemaType {
    SchemaType::object(vec![
        Property::new("company_name", SchemaType::String),
        Property::new("email", SchemaType::String),
        Property::new("name", SchemaType::String),
        Property::new("person_id", SchemaType::String),
        Property::new("title", SchemaType::String),
        Property::new("type", SchemaType::String),
        Property::new("user_id", SchemaType::String),
    ])
}
