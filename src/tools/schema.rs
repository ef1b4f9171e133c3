//! Structural argument schemas for tools.
//!
//! Small on purpose: an object of named properties, each with a JSON type
//! and a required flag. It renders to JSON Schema for the model and checks
//! arguments before a tool runs.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    /// No type constraint.
    Any,
}

impl ValueKind {
    fn json_type(self) -> Option<&'static str> {
        match self {
            ValueKind::String => Some("string"),
            ValueKind::Number => Some("number"),
            ValueKind::Integer => Some("integer"),
            ValueKind::Boolean => Some("boolean"),
            ValueKind::Array => Some("array"),
            ValueKind::Object => Some("object"),
            ValueKind::Any => None,
        }
    }

    fn from_json_type(ty: Option<&str>) -> Self {
        match ty {
            Some("string") => ValueKind::String,
            Some("number") => ValueKind::Number,
            Some("integer") => ValueKind::Integer,
            Some("boolean") => ValueKind::Boolean,
            Some("array") => ValueKind::Array,
            Some("object") => ValueKind::Object,
            _ => ValueKind::Any,
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
            ValueKind::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: ValueKind,
    pub description: String,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSchema {
    properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("arguments must be a JSON object")]
    NotAnObject,
    #[error("missing required argument '{0}'")]
    Missing(String),
    #[error("argument '{name}' must be of type {expected}")]
    WrongType { name: String, expected: &'static str },
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, kind: ValueKind, description: &str) -> Self {
        self.property(name, kind, description, true)
    }

    pub fn optional(self, name: &str, kind: ValueKind, description: &str) -> Self {
        self.property(name, kind, description, false)
    }

    fn property(mut self, name: &str, kind: ValueKind, description: &str, required: bool) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required,
        });
        self
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// `null` is accepted as "no arguments". Unknown keys are ignored.
    pub fn validate(&self, args: &Value) -> Result<(), SchemaError> {
        let empty = Map::new();
        let obj = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => return Err(SchemaError::NotAnObject),
        };

        for prop in &self.properties {
            match obj.get(&prop.name) {
                None | Some(Value::Null) if prop.required => {
                    return Err(SchemaError::Missing(prop.name.clone()))
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    if !prop.kind.matches(value) {
                        return Err(SchemaError::WrongType {
                            name: prop.name.clone(),
                            expected: prop.kind.json_type().unwrap_or("any"),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for prop in &self.properties {
            let mut entry = Map::new();
            if let Some(ty) = prop.kind.json_type() {
                entry.insert("type".into(), json!(ty));
            }
            if !prop.description.is_empty() {
                entry.insert("description".into(), json!(prop.description));
            }
            properties.insert(prop.name.clone(), Value::Object(entry));
        }
        let required: Vec<&str> = self
            .properties
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Reads the top-level properties of a JSON Schema object, as published
    /// by remote tool servers. Nested constraints are not enforced.
    pub fn from_json_schema(schema: &Value) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, spec)| Property {
                        name: name.clone(),
                        kind: ValueKind::from_json_type(spec.get("type").and_then(Value::as_str)),
                        description: spec
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        required: required.contains(&name.as_str()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { properties }
    }
}
