//! Failures the pipeline cannot answer for itself

use super::{get, post_json, Person};
use bytes::Bytes;
use futures::FutureExt;
use http::Method;
use srf_core::{
    BodyError, DispatchError, Dispatcher, Endpoint, Field, Json, Operation, Request, Schema,
    Validate,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_handler_error_propagates() {
    let endpoint = Endpoint::builder("flaky")
        .fetch(Operation::new(|_req| async {
            Err::<(), _>(anyhow::anyhow!("upstream timed out"))
        }))
        .build();

    let err = Dispatcher::default()
        .dispatch(&endpoint, get("/flaky"))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Handler(_)));
    assert!(err.to_string().contains("upstream timed out"));
}

#[tokio::test]
async fn test_body_read_failure_propagates() {
    let endpoint = Endpoint::builder("people")
        .submit(Operation::with_data(|_req, person: Person| async move {
            Ok::<_, anyhow::Error>(Json(person))
        }))
        .build();

    let request = Request::builder(Method::POST)
        .body_future(async { Err(BodyError::TooLarge { limit: 16 }) }.boxed())
        .build()
        .unwrap();

    let err = Dispatcher::default()
        .dispatch(&endpoint, request)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::BodyRead(BodyError::TooLarge { limit: 16 })
    ));
}

#[tokio::test]
async fn test_body_is_not_read_without_schema() {
    let reads = Arc::new(AtomicUsize::new(0));
    let counter = reads.clone();
    let endpoint = Endpoint::builder("hooks")
        .submit(Operation::new(|_req| async { Ok::<_, anyhow::Error>(()) }))
        .build();

    let request = Request::builder(Method::POST)
        .body_future(
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from_static(b"not json"))
            }
            .boxed(),
        )
        .build()
        .unwrap();

    let response = Dispatcher::default()
        .dispatch(&endpoint, request)
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_may_read_body_after_validation() {
    let endpoint = Endpoint::builder("people")
        .submit(Operation::with_data(|req, _person: Person| async move {
            let raw = req.body().await?;
            Ok::<_, anyhow::Error>(serde_json::json!(raw.len()))
        }))
        .build();

    let body = r#"{"name":"Ada","age":36}"#;
    let response = Dispatcher::default()
        .dispatch(&endpoint, post_json("/people", body))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.body_bytes(), body.len().to_string());
}

/// Schema and type disagree: the schema lets `count` be optional, the type
/// demands it.
#[derive(Debug, serde::Deserialize)]
struct Strict {
    #[allow(dead_code)]
    count: u8,
}

impl Validate for Strict {
    fn schema() -> Schema {
        Schema::new().field(Field::integer("count").optional())
    }
}

#[tokio::test]
async fn test_data_mismatch_is_an_error() {
    let endpoint = Endpoint::builder("strict")
        .fetch(Operation::with_data(|_req, _strict: Strict| async {
            Ok::<_, anyhow::Error>(())
        }))
        .build();

    let err = Dispatcher::default()
        .dispatch(&endpoint, get("/strict"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::DataMismatch { .. }));
}

/// Draft note: `body` has a default, `summary` is optional without one
#[derive(Debug, serde::Deserialize, serde::Serialize)]
struct Draft {
    title: String,
    body: String,
    summary: Option<String>,
}

impl Validate for Draft {
    fn schema() -> Schema {
        Schema::new()
            .field(Field::string("title").min_length(1))
            .field(Field::string("body").default(serde_json::json!("")))
            .field(Field::string("summary").optional())
    }
}

fn drafts() -> Endpoint {
    Endpoint::builder("drafts")
        .submit(Operation::with_data(|_req, draft: Draft| async move {
            Ok::<_, anyhow::Error>(Json(draft))
        }))
        .build()
}

#[tokio::test]
async fn test_null_on_defaulted_field_reaches_handler_with_default() {
    let response = Dispatcher::default()
        .dispatch(&drafts(), post_json("/drafts", r#"{"title":"x","body":null}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let draft: serde_json::Value = serde_json::from_slice(&response.body_bytes()).unwrap();
    assert_eq!(
        draft,
        serde_json::json!({"title": "x", "body": "", "summary": null})
    );
}

#[tokio::test]
async fn test_null_on_optional_field_reaches_handler_as_none() {
    let response = Dispatcher::default()
        .dispatch(
            &drafts(),
            post_json("/drafts", r#"{"title":"x","body":"text","summary":null}"#),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let draft: serde_json::Value = serde_json::from_slice(&response.body_bytes()).unwrap();
    assert_eq!(draft["body"], "text");
    assert!(draft["summary"].is_null());
}

#[tokio::test]
async fn test_null_on_required_field_is_a_client_error() {
    let response = Dispatcher::default()
        .dispatch(&drafts(), post_json("/drafts", r#"{"title":null}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let errors: serde_json::Value = serde_json::from_slice(&response.body_bytes()).unwrap();
    assert_eq!(errors, serde_json::json!({"title": ["may not be null"]}));
}
