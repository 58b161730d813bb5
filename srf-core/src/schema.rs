//! Declarative input schemas and the validator that applies them
//!
//! A [`Schema`] is an ordered list of [`Field`]s. Validation walks every
//! declared field and collects one [`ValidationError`] per failed check, so a
//! single pass reports all problems with the input. On success the result is a
//! normalized JSON object (coerced scalars, defaults filled in, unknown keys
//! dropped) that deserializes into the operation's declared type.
//!
//! Query-string input only ever carries strings, so integers, floats and
//! booleans also accept their textual spellings.

use crate::error::SchemaError;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Path segment used for errors about the input as a whole
pub const ROOT_PATH: &str = "__root__";

/// Message for a missing required field
pub const REQUIRED: &str = "required";

/// One failed check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Location of the offending value, outermost segment first
    pub path: Vec<String>,
    /// Human-readable reason
    pub message: String,
}

impl ValidationError {
    /// Create a validation error
    pub fn new(path: Vec<String>, message: impl Into<String>) -> Self {
        ValidationError {
            path,
            message: message.into(),
        }
    }

    /// Path segments joined with `.`
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.dotted_path(), self.message)
    }
}

/// Types that declare the schema their input is validated against
pub trait Validate: DeserializeOwned + Send + 'static {
    /// Schema for this type
    fn schema() -> Schema;
}

/// Compiled regular expression usable as a schema constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile a pattern
    pub fn new(pattern: &str) -> Result<Self, SchemaError> {
        Regex::new(pattern)
            .map(Pattern)
            .map_err(|source| SchemaError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Source text of the pattern
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl TryFrom<String> for Pattern {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Pattern::new(&value)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.as_str().to_string()
    }
}

/// Constraint checked after a value has the right type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Inclusive lower bound for numbers
    Min(f64),
    /// Inclusive upper bound for numbers
    Max(f64),
    /// Minimum length of a string (in characters) or array
    MinLength(usize),
    /// Maximum length of a string (in characters) or array
    MaxLength(usize),
    /// Regular expression a string must match
    Pattern(Pattern),
    /// Closed set of allowed values
    OneOf(Vec<Value>),
}

/// Expected type of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 string
    String,
    /// Signed 64-bit integer
    Integer,
    /// Floating point number
    Float,
    /// Boolean
    Boolean,
    /// Any JSON value, unchecked
    Any,
    /// Nested object with its own schema
    Object(Schema),
    /// Homogeneous array
    Array {
        /// Type of every item
        items: Box<FieldType>,
    },
}

impl FieldType {
    /// Name used in type mismatch messages
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "number",
            FieldType::Boolean => "boolean",
            FieldType::Any => "any",
            FieldType::Object(_) => "object",
            FieldType::Array { .. } => "array",
        }
    }
}

fn default_required() -> bool {
    true
}

/// One declared field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Key in the input object
    pub name: String,
    /// Expected type
    #[serde(flatten)]
    pub kind: FieldType,
    /// Whether the key must be present
    #[serde(default = "default_required")]
    pub required: bool,
    /// Value used when an optional field is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Checks applied after type coercion
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
}

impl Field {
    /// Required field of the given type
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Field {
            name: name.into(),
            kind,
            required: true,
            default: None,
            constraints: Vec::new(),
        }
    }

    /// Required string field
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    /// Required integer field
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    /// Required float field
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    /// Required boolean field
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// Required nested object
    pub fn object(name: impl Into<String>, schema: Schema) -> Self {
        Self::new(name, FieldType::Object(schema))
    }

    /// Required array
    pub fn array(name: impl Into<String>, items: FieldType) -> Self {
        Self::new(
            name,
            FieldType::Array {
                items: Box::new(items),
            },
        )
    }

    /// Mark as optional without a default
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Mark as optional, filling `value` when absent
    pub fn default(mut self, value: Value) -> Self {
        self.required = false;
        self.default = Some(value);
        self
    }

    /// Add a constraint
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Inclusive numeric lower bound
    pub fn min(self, min: f64) -> Self {
        self.constraint(Constraint::Min(min))
    }

    /// Inclusive numeric upper bound
    pub fn max(self, max: f64) -> Self {
        self.constraint(Constraint::Max(max))
    }

    /// Minimum length
    pub fn min_length(self, len: usize) -> Self {
        self.constraint(Constraint::MinLength(len))
    }

    /// Maximum length
    pub fn max_length(self, len: usize) -> Self {
        self.constraint(Constraint::MaxLength(len))
    }

    /// Pattern for string values
    pub fn pattern(self, pattern: Pattern) -> Self {
        self.constraint(Constraint::Pattern(pattern))
    }

    /// Allowed values
    pub fn one_of(self, values: Vec<Value>) -> Self {
        self.constraint(Constraint::OneOf(values))
    }
}

/// Ordered set of fields describing an input object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Fields in declaration order
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Schema {
    /// Empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Decode a schema document in JSON
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(text).map_err(|e| SchemaError::Decode(e.to_string()))
    }

    /// Decode a schema document in TOML
    pub fn from_toml(text: &str) -> Result<Self, SchemaError> {
        toml::from_str(text).map_err(|e| SchemaError::Decode(e.to_string()))
    }

    /// Validate `raw` against this schema
    pub fn validate(&self, raw: &Value) -> Result<Value, Vec<ValidationError>> {
        validate(self, raw)
    }
}

/// Validate untyped input, returning the normalized object or every error found
pub fn validate(schema: &Schema, raw: &Value) -> Result<Value, Vec<ValidationError>> {
    let Value::Object(input) = raw else {
        return Err(vec![ValidationError::new(
            vec![ROOT_PATH.to_string()],
            type_mismatch("object"),
        )]);
    };

    let mut errors = Vec::new();
    let mut path = Vec::new();
    let output = validate_object(schema, input, &mut path, &mut errors);

    if errors.is_empty() {
        Ok(Value::Object(output))
    } else {
        Err(errors)
    }
}

/// Validate and deserialize into `T` in one step
pub fn validate_as<T: Validate>(raw: &Value) -> Result<T, Vec<ValidationError>> {
    let value = validate(&T::schema(), raw)?;
    serde_json::from_value(value).map_err(|e| {
        vec![ValidationError::new(
            vec![ROOT_PATH.to_string()],
            e.to_string(),
        )]
    })
}

fn validate_object(
    schema: &Schema,
    input: &Map<String, Value>,
    path: &mut Vec<String>,
    errors: &mut Vec<ValidationError>,
) -> Map<String, Value> {
    let mut output = Map::new();

    for field in &schema.fields {
        path.push(field.name.clone());

        // null on a defaulted field counts as absent
        let value = input
            .get(&field.name)
            .filter(|v| !(v.is_null() && field.default.is_some()));

        match value {
            None => {
                if let Some(default) = &field.default {
                    output.insert(field.name.clone(), default.clone());
                } else if field.required {
                    errors.push(ValidationError::new(path.clone(), REQUIRED));
                }
            }
            Some(Value::Null) if !field.required => {
                output.insert(field.name.clone(), Value::Null);
            }
            Some(Value::Null) => {
                errors.push(ValidationError::new(path.clone(), "may not be null"));
            }
            Some(value) => {
                if let Some(checked) =
                    check_value(&field.kind, &field.constraints, value, path, errors)
                {
                    output.insert(field.name.clone(), checked);
                }
            }
        }

        path.pop();
    }

    output
}

fn check_value(
    kind: &FieldType,
    constraints: &[Constraint],
    value: &Value,
    path: &mut Vec<String>,
    errors: &mut Vec<ValidationError>,
) -> Option<Value> {
    let coerced = match kind {
        FieldType::String => value.as_str().map(|s| Value::String(s.to_string())),
        FieldType::Integer => coerce_integer(value),
        FieldType::Float => coerce_float(value),
        FieldType::Boolean => coerce_boolean(value),
        FieldType::Any => Some(value.clone()),
        FieldType::Object(schema) => match value {
            Value::Object(map) => {
                let before = errors.len();
                let nested = validate_object(schema, map, path, errors);
                if errors.len() > before {
                    return None;
                }
                Some(Value::Object(nested))
            }
            _ => None,
        },
        FieldType::Array { items } => match value {
            Value::Array(values) => {
                let before = errors.len();
                let mut checked = Vec::with_capacity(values.len());
                for (index, item) in values.iter().enumerate() {
                    path.push(index.to_string());
                    if let Some(item) = check_value(items, &[], item, path, errors) {
                        checked.push(item);
                    }
                    path.pop();
                }
                if errors.len() > before {
                    return None;
                }
                Some(Value::Array(checked))
            }
            _ => None,
        },
    };

    let Some(coerced) = coerced else {
        errors.push(ValidationError::new(path.clone(), type_mismatch(kind.name())));
        return None;
    };

    let before = errors.len();
    for constraint in constraints {
        if let Some(message) = check_constraint(constraint, &coerced) {
            errors.push(ValidationError::new(path.clone(), message));
        }
    }

    (errors.len() == before).then_some(coerced)
}

fn check_constraint(constraint: &Constraint, value: &Value) -> Option<String> {
    match constraint {
        Constraint::Min(min) => value
            .as_f64()
            .filter(|n| n < min)
            .map(|_| format!("must be greater than or equal to {}", min)),
        Constraint::Max(max) => value
            .as_f64()
            .filter(|n| n > max)
            .map(|_| format!("must be less than or equal to {}", max)),
        Constraint::MinLength(len) => length_of(value)
            .filter(|(n, _)| n < len)
            .map(|(_, unit)| format!("must have at least {} {}", len, unit)),
        Constraint::MaxLength(len) => length_of(value)
            .filter(|(n, _)| n > len)
            .map(|(_, unit)| format!("must have at most {} {}", len, unit)),
        Constraint::Pattern(pattern) => value
            .as_str()
            .filter(|s| !pattern.is_match(s))
            .map(|_| format!("must match pattern {}", pattern.as_str())),
        Constraint::OneOf(allowed) => (!allowed.contains(value)).then(|| {
            let listed: Vec<String> = allowed.iter().map(Value::to_string).collect();
            format!("must be one of: {}", listed.join(", "))
        }),
    }
}

fn length_of(value: &Value) -> Option<(usize, &'static str)> {
    match value {
        Value::String(s) => Some((s.chars().count(), "characters")),
        Value::Array(a) => Some((a.len(), "items")),
        _ => None,
    }
}

fn type_mismatch(expected: &str) -> String {
    format!("type mismatch: expected {}", expected)
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .map(Value::from)
}

fn coerce_float(value: &Value) -> Option<Value> {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    Number::from_f64(f).map(Value::Number)
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Some(true),
            "false" | "0" | "no" | "off" | "f" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
    .map(Value::Bool)
}
