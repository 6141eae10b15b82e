//! Structural type descriptors for stream schemas.
//!
//! A schema is built once at startup from a static definition and validated
//! once; normalization walks it for every record instead of re-deriving types
//! from the payload.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

/// Semantic type of a schema field. Every field is nullable.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    DateTime,
    Object(Vec<Property>),
    Array(Box<SchemaType>),
}

impl SchemaType {
    pub fn object(properties: Vec<Property>) -> Self {
        SchemaType::Object(properties)
    }

    pub fn array_of(items: SchemaType) -> Self {
        SchemaType::Array(Box::new(items))
    }

    /// Short name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::DateTime => "date-time",
            SchemaType::Object(_) => "object",
            SchemaType::Array(_) => "array",
        }
    }

    /// Render as a JSON Schema fragment.
    pub fn to_json_schema(&self) -> Value {
        match self {
            SchemaType::String => json!({ "type": ["string", "null"] }),
            SchemaType::Number => json!({ "type": ["number", "null"] }),
            SchemaType::Integer => json!({ "type": ["integer", "null"] }),
            SchemaType::Boolean => json!({ "type": ["boolean", "null"] }),
            SchemaType::DateTime => json!({ "type": ["string", "null"], "format": "date-time" }),
            SchemaType::Object(properties) => json!({
                "type": ["object", "null"],
                "properties": properties_json(properties),
            }),
            SchemaType::Array(items) => json!({
                "type": ["array", "null"],
                "items": items.to_json_schema(),
            }),
        }
    }
}

/// A named field in an object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: SchemaType,
    pub description: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, kind: SchemaType) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut fragment = self.kind.to_json_schema();
        if let (Some(description), Value::Object(obj)) = (&self.description, &mut fragment) {
            obj.insert("description".into(), Value::String(description.clone()));
        }
        fragment
    }
}

fn properties_json(properties: &[Property]) -> Value {
    Value::Object(
        properties
            .iter()
            .map(|p| (p.name.clone(), p.to_json_schema()))
            .collect(),
    )
}

/// Top-level schema of a stream: an ordered list of properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    properties: Vec<Property>,
}

impl Schema {
    pub fn new(properties: Vec<Property>) -> Self {
        Self { properties }
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Look up a nested property by path (e.g. `["email", "sent_time"]`).
    pub fn get_path(&self, path: &[String]) -> Option<&Property> {
        let (first, rest) = path.split_first()?;
        let mut current = self.get(first)?;
        for segment in rest {
            current = match &current.kind {
                SchemaType::Object(props) => props.iter().find(|p| &p.name == segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Check structural soundness: property names are non-empty and unique at
    /// every nesting level.
    pub fn validate(&self) -> Result<(), String> {
        validate_properties(&self.properties, "")
    }

    /// True when every key in `data` (recursively) is declared by this schema.
    pub fn covers(&self, data: &Map<String, Value>) -> bool {
        object_covered(&self.properties, data)
    }

    /// Render as a JSON Schema document.
    pub fn to_json_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": properties_json(&self.properties),
        })
    }
}

fn validate_properties(properties: &[Property], prefix: &str) -> Result<(), String> {
    let mut seen = HashSet::new();
    for property in properties {
        if property.name.is_empty() {
            return Err(format!("empty property name under '{}'", prefix));
        }
        let path = if prefix.is_empty() {
            property.name.clone()
        } else {
            format!("{}.{}", prefix, property.name)
        };
        if !seen.insert(property.name.as_str()) {
            return Err(format!("duplicate property '{}'", path));
        }
        validate_kind(&property.kind, &path)?;
    }
    Ok(())
}

fn validate_kind(kind: &SchemaType, path: &str) -> Result<(), String> {
    match kind {
        SchemaType::Object(props) => validate_properties(props, path),
        SchemaType::Array(items) => validate_kind(items, &format!("{}[]", path)),
        _ => Ok(()),
    }
}

fn object_covered(properties: &[Property], data: &Map<String, Value>) -> bool {
    data.iter().all(|(key, value)| {
        properties
            .iter()
            .find(|p| &p.name == key)
            .is_some_and(|p| value_covered(&p.kind, value))
    })
}

fn value_covered(kind: &SchemaType, value: &Value) -> bool {
    match (kind, value) {
        (SchemaType::Object(props), Value::Object(obj)) => object_covered(props, obj),
        (SchemaType::Array(items), Value::Array(arr)) => {
            arr.iter().all(|v| value_covered(items, v))
        }
        _ => true,
    }
}
