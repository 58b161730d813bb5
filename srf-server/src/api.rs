//! API request and response types

use serde::{Deserialize, Serialize};
use serde_json::json;
use srf_core::{Field, FieldType, Schema, Validate};

/// A stored note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Server-assigned identifier
    pub id: u64,
    /// Short title
    pub title: String,
    /// Free text
    pub body: String,
    /// Labels used for filtering
    pub tags: Vec<String>,
}

/// Body of `POST /v1/notes`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewNote {
    /// Short title, 1 to 120 characters
    pub title: String,
    /// Free text
    pub body: String,
    /// Labels used for filtering
    pub tags: Vec<String>,
}

impl Validate for NewNote {
    fn schema() -> Schema {
        Schema::new()
            .field(Field::string("title").min_length(1).max_length(120))
            .field(Field::string("body").default(json!("")))
            .field(
                Field::array("tags", FieldType::String)
                    .default(json!([]))
                    .max_length(16),
            )
    }
}

/// Query of `GET /v1/notes`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NoteQuery {
    /// 1-based page number
    pub page: i64,
    /// Page size, at most 100
    pub per_page: i64,
    /// Only notes carrying this tag
    pub tag: Option<String>,
}

impl Validate for NoteQuery {
    fn schema() -> Schema {
        Schema::new()
            .field(Field::integer("page").default(json!(1)).min(1.0))
            .field(
                Field::integer("per_page")
                    .default(json!(20))
                    .min(1.0)
                    .max(100.0),
            )
            .field(Field::string("tag").optional())
    }
}

/// One page of notes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePage {
    /// Notes on this page
    pub items: Vec<Note>,
    /// Page number
    pub page: i64,
    /// Page size
    pub per_page: i64,
    /// Matching notes across all pages
    pub total: usize,
}

/// Body of `POST /v1/checksum`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChecksumInput {
    /// Text to digest
    pub text: String,
    /// Number of digest rounds
    pub rounds: i64,
}

impl Validate for ChecksumInput {
    fn schema() -> Schema {
        Schema::new()
            .field(Field::string("text").max_length(65_536))
            .field(
                Field::integer("rounds")
                    .default(json!(1))
                    .min(1.0)
                    .max(100_000.0),
            )
    }
}

/// Response of `POST /v1/checksum`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumOutput {
    /// Hex-encoded digest
    pub checksum: String,
    /// Rounds applied
    pub rounds: i64,
}

/// Body of `POST /v1/contact`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContactMessage {
    /// Reply address
    pub email: String,
    /// Routing topic
    pub topic: String,
    /// Message text
    pub message: String,
}

impl Validate for ContactMessage {
    fn schema() -> Schema {
        Schema::new()
            .field(Field::string("email").min_length(3))
            .field(
                Field::string("topic")
                    .default(json!("support"))
                    .one_of(vec![json!("support"), json!("sales"), json!("feedback")]),
            )
            .field(Field::string("message").min_length(1).max_length(4_000))
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status
    pub status: HealthStatus,

    /// Service version
    pub version: String,

    /// Uptime in seconds
    pub uptime_seconds: u64,

    /// Requests dispatched so far
    pub dispatched: u64,

    /// Blocking operations currently running
    pub blocking_in_flight: usize,
}

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Service is healthy
    Healthy,
    /// Service is degraded but functional
    Degraded,
}
