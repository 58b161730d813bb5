//! Wire format for validation failures

use crate::schema::ValidationError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Dotted field path to every message reported for it.
///
/// Keys keep the order in which their path was first seen; messages keep the
/// order in which they were produced. Serializes to the literal 400 body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorMap(IndexMap<String, Vec<String>>);

impl ErrorMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message under `path`
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.entry(path.into()).or_default().push(message.into());
    }

    /// Messages for one path
    pub fn get(&self, path: &str) -> Option<&[String]> {
        self.0.get(path).map(Vec::as_slice)
    }

    /// Paths in first-seen order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over paths and their messages
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of distinct paths
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no errors were recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON body for the error response
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
                .collect(),
        )
    }
}

impl<'a> FromIterator<&'a ValidationError> for ErrorMap {
    fn from_iter<I: IntoIterator<Item = &'a ValidationError>>(iter: I) -> Self {
        let mut map = ErrorMap::new();
        for error in iter {
            map.push(error.dotted_path(), error.message.clone());
        }
        map
    }
}

/// Group validation errors by dotted path
pub fn transform_errors(errors: &[ValidationError]) -> ErrorMap {
    errors.iter().collect()
}
