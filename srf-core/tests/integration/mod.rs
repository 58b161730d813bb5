//! Integration test modules
//!
//! End-to-end testing covering:
//! - Verb resolution and the HEAD/OPTIONS conventions
//! - Permission ordering and short-circuiting
//! - Query and body validation
//! - Blocking operations on the worker pool
//! - Errors that escape the pipeline

pub mod blocking_operations;
pub mod error_scenarios;
pub mod verb_scenarios;

use serde::{Deserialize, Serialize};
use srf_core::{Field, Request, Schema, Validate};

/// Typed body used across the suites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub age: i64,
}

impl Validate for Person {
    fn schema() -> Schema {
        Schema::new()
            .field(Field::string("name").min_length(1))
            .field(Field::integer("age").min(0.0))
    }
}

/// Typed query used across the suites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paging {
    pub page: i64,
    pub size: i64,
}

impl Validate for Paging {
    fn schema() -> Schema {
        Schema::new()
            .field(Field::integer("page").default(1.into()).min(1.0))
            .field(Field::integer("size").default(20.into()).max(100.0))
    }
}

/// GET request for `path`, with an optional query string after `?`
pub fn get(target: &str) -> Request {
    request(http::Method::GET, target)
}

/// Bodyless request with an arbitrary verb
pub fn request(method: http::Method, target: &str) -> Request {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    Request::builder(method)
        .path(path)
        .query(query)
        .build()
        .expect("request")
}

/// POST request with a JSON body
pub fn post_json(path: &str, body: &str) -> Request {
    Request::builder(http::Method::POST)
        .path(path)
        .header("content-type", "application/json")
        .body(body.to_string())
        .build()
        .expect("request")
}
