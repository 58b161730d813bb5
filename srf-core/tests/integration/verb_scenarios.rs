//! Verb resolution, permissions and query validation

use super::{get, request, Paging};
use http::Method;
use parking_lot::Mutex;
use serde_json::json;
use srf_core::{
    Body, Dispatcher, Endpoint, Json, Operation, Permission, ReadOnly, Request, RequireHeader,
};
use std::sync::Arc;

#[tokio::test]
async fn test_head_runs_get_without_body() {
    let endpoint = Endpoint::builder("items")
        .fetch(Operation::new(|_req| async {
            Ok::<_, anyhow::Error>(json!([1, 2, 3]))
        }))
        .build();

    let response = Dispatcher::default()
        .dispatch(&endpoint, request(Method::HEAD, "/items"))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), &Body::Empty);
    assert_eq!(response.headers()["content-type"], "application/json");
}

#[tokio::test]
async fn test_unknown_verb_lists_allowed_methods() {
    let endpoint = Endpoint::builder("items")
        .fetch(Operation::new(|_req| async { Ok::<_, anyhow::Error>(()) }))
        .on(
            Method::DELETE,
            Operation::new(|_req| async { Ok::<_, anyhow::Error>(()) }),
        )
        .build();

    let response = Dispatcher::default()
        .dispatch(&endpoint, request(Method::PUT, "/items"))
        .await
        .unwrap();

    assert_eq!(response.status(), 405);
    assert_eq!(response.headers()["allow"], "GET, DELETE, HEAD");
    assert_eq!(response.body(), &Body::Text("Method Not Allowed".into()));
}

#[tokio::test]
async fn test_form_answers_options() {
    let endpoint = Endpoint::form("contact").build();

    let response = Dispatcher::default()
        .dispatch(&endpoint, request(Method::OPTIONS, "/contact"))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["allow"], "GET, POST, OPTIONS, HEAD");
    assert_eq!(response.body(), &Body::Empty);
}

#[tokio::test]
async fn test_query_is_validated_with_defaults() {
    let endpoint = Endpoint::builder("notes")
        .fetch(Operation::with_data(|_req, paging: Paging| async move {
            Ok::<_, anyhow::Error>(Json(paging))
        }))
        .build();
    let dispatcher = Dispatcher::default();

    let response = dispatcher
        .dispatch(&endpoint, get("/notes?page=3"))
        .await
        .unwrap();
    assert_eq!(response.body(), &Body::Json(json!({"page": 3, "size": 20})));

    let response = dispatcher
        .dispatch(&endpoint, get("/notes?page=0&size=500"))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(
        response.body(),
        &Body::Json(json!({
            "page": ["must be greater than or equal to 1"],
            "size": ["must be less than or equal to 100"],
        }))
    );
}

#[tokio::test]
async fn test_repeated_query_key_last_wins() {
    let endpoint = Endpoint::builder("notes")
        .fetch(Operation::with_data(|_req, paging: Paging| async move {
            Ok::<_, anyhow::Error>(json!(paging.page))
        }))
        .build();

    let response = Dispatcher::default()
        .dispatch(&endpoint, get("/notes?page=2&page=5"))
        .await
        .unwrap();
    assert_eq!(response.body(), &Body::Json(json!(5)));
}

struct Traced {
    name: &'static str,
    allow: bool,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait::async_trait]
impl Permission for Traced {
    async fn has_permission(&self, _request: &Request, _endpoint: &Endpoint) -> bool {
        self.log.lock().push(self.name);
        self.allow
    }
}

#[tokio::test]
async fn test_rules_run_in_declaration_order_until_denied() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (a, b, c) = (log.clone(), log.clone(), log.clone());
    let endpoint = Endpoint::builder("ordered")
        .permission_with(move || Traced { name: "a", allow: true, log: a.clone() })
        .permission_with(move || Traced { name: "b", allow: false, log: b.clone() })
        .permission_with(move || Traced { name: "c", allow: true, log: c.clone() })
        .fetch(Operation::new(|_req| async { Ok::<_, anyhow::Error>(()) }))
        .build();

    let response = Dispatcher::default()
        .dispatch(&endpoint, get("/ordered"))
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    assert_eq!(*log.lock(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_permissions_run_before_validation() {
    let endpoint = Endpoint::builder("notes")
        .permission_with(|| RequireHeader::new("x-api-key"))
        .fetch(Operation::with_data(|_req, paging: Paging| async move {
            Ok::<_, anyhow::Error>(Json(paging))
        }))
        .build();

    let response = Dispatcher::default()
        .dispatch(&endpoint, get("/notes?page=nope"))
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(
        response.body(),
        &Body::Text("Authentication credentials were not provided.".into())
    );
}

#[tokio::test]
async fn test_read_only_endpoint_refuses_writes() {
    let endpoint = Endpoint::builder("archive")
        .permission::<ReadOnly>()
        .fetch(Operation::new(|_req| async { Ok::<_, anyhow::Error>(()) }))
        .on(
            Method::DELETE,
            Operation::new(|_req| async { Ok::<_, anyhow::Error>(()) }),
        )
        .build();
    let dispatcher = Dispatcher::default();

    let read = dispatcher.dispatch(&endpoint, get("/archive")).await.unwrap();
    assert_eq!(read.status(), 204);

    let delete = dispatcher
        .dispatch(&endpoint, request(Method::DELETE, "/archive"))
        .await
        .unwrap();
    assert_eq!(delete.status(), 403);
}
