//! JSON Schema descriptions for structured output.
//!
//! A schema is either supplied verbatim as JSON or derived from a type that
//! implements [`StructuredOutput`] by listing its fields explicitly.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::client::ClientError;

/// Primitive or array type tag of a schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<FieldType>),
    Object,
}

impl FieldType {
    pub fn array_of(item: FieldType) -> Self {
        FieldType::Array(Box::new(item))
    }

    fn to_schema(&self) -> Value {
        match self {
            FieldType::String => json!({"type": "string"}),
            FieldType::Integer => json!({"type": "integer"}),
            FieldType::Number => json!({"type": "number"}),
            FieldType::Boolean => json!({"type": "boolean"}),
            FieldType::Object => json!({"type": "object"}),
            FieldType::Array(item) => json!({"type": "array", "items": item.to_schema()}),
        }
    }
}

/// One described field of a structured output type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub description: Option<String>,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: None,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A type the model can be asked to produce.
///
/// Only the fields listed by [`describe_schema`](StructuredOutput::describe_schema)
/// appear in the schema. Hydration goes through serde, so JSON keys the type
/// does not know are ignored and missing `Option` fields become `None`.
///
/// # Example
/// ```rust
/// use chatwire::schema::{FieldSpec, FieldType, SchemaDescriptor, StructuredOutput};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Person {
///     name: String,
///     age: i64,
///     email: Option<String>,
/// }
///
/// impl StructuredOutput for Person {
///     fn describe_schema() -> Vec<FieldSpec> {
///         vec![
///             FieldSpec::required("name", FieldType::String).describe("Full name"),
///             FieldSpec::required("age", FieldType::Integer),
///             FieldSpec::optional("email", FieldType::String),
///         ]
///     }
/// }
///
/// let schema = SchemaDescriptor::for_type::<Person>()?;
/// assert_eq!(schema.as_value()["required"], serde_json::json!(["name", "age"]));
/// # Ok::<(), chatwire::ClientError>(())
/// ```
pub trait StructuredOutput: DeserializeOwned {
    fn describe_schema() -> Vec<FieldSpec>;
}

/// A validated JSON Schema for an object.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    schema: Value,
}

impl SchemaDescriptor {
    /// Use a caller-supplied schema verbatim after checking its shape.
    pub fn from_value(schema: Value) -> Result<Self, ClientError> {
        let object = schema
            .as_object()
            .ok_or_else(|| ClientError::validation("schema must be a JSON object"))?;

        match object.get("type").and_then(Value::as_str) {
            Some("object") => {}
            Some(other) => {
                return Err(ClientError::validation(format!(
                    "schema type must be \"object\", got \"{}\"",
                    other
                )))
            }
            None => return Err(ClientError::validation("schema is missing \"type\"")),
        }

        if let Some(properties) = object.get("properties") {
            if !properties.is_object() {
                return Err(ClientError::validation("schema \"properties\" must be an object"));
            }
        }
        if let Some(required) = object.get("required") {
            let all_strings = required
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string));
            if !all_strings {
                return Err(ClientError::validation(
                    "schema \"required\" must be an array of strings",
                ));
            }
        }

        Ok(Self { schema })
    }

    /// Build a schema from explicit field descriptions.
    pub fn from_fields(fields: &[FieldSpec]) -> Result<Self, ClientError> {
        let mut seen = HashSet::new();
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in fields {
            if field.name.trim().is_empty() {
                return Err(ClientError::validation("schema field name must not be empty"));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ClientError::validation(format!(
                    "schema field '{}' is declared twice",
                    field.name
                )));
            }

            let mut property = field.field_type.to_schema();
            if let (Some(description), Some(obj)) = (&field.description, property.as_object_mut()) {
                obj.insert("description".to_string(), Value::String(description.clone()));
            }
            properties.insert(field.name.clone(), property);
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        Ok(Self {
            schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false
            }),
        })
    }

    /// Derive the schema of a [`StructuredOutput`] type.
    pub fn for_type<T: StructuredOutput>() -> Result<Self, ClientError> {
        Self::from_fields(&T::describe_schema())
    }

    pub fn as_value(&self) -> &Value {
        &self.schema
    }

    /// `response_format` directive asking for strict schema-conformant JSON.
    pub fn response_format(&self) -> Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "strict": true,
                "schema": self.schema
            }
        })
    }
}
