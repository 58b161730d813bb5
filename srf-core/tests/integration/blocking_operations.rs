//! Blocking operations on the bounded worker pool

use super::{get, post_json, Person};
use srf_core::{
    BackpressureMode, Body, DispatchError, Dispatcher, Endpoint, Operation, Response, WorkerPool,
    WorkerPoolConfig,
};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

fn dispatcher(max_blocking: usize, backpressure: BackpressureMode) -> Dispatcher {
    Dispatcher::new(WorkerPool::new(WorkerPoolConfig {
        max_blocking,
        backpressure,
        queue_timeout_ms: 50,
    }))
}

#[tokio::test]
async fn test_blocking_operation_runs_off_the_reactor() {
    let reactor: ThreadId = std::thread::current().id();
    let endpoint = Endpoint::builder("checksum")
        .fetch(Operation::blocking(move |_req| {
            let same = std::thread::current().id() == reactor;
            Ok::<_, anyhow::Error>(serde_json::json!({"on_reactor": same}))
        }))
        .build();

    let response = Dispatcher::default()
        .dispatch(&endpoint, get("/checksum"))
        .await
        .unwrap();
    assert_eq!(
        response.body(),
        &Body::Json(serde_json::json!({"on_reactor": false}))
    );
}

#[tokio::test]
async fn test_blocking_operation_with_data() {
    let endpoint = Endpoint::builder("people")
        .submit(Operation::blocking_with_data(|_req, person: Person| {
            Ok::<_, anyhow::Error>(Response::text(
                http::StatusCode::CREATED,
                person.name.to_uppercase(),
            ))
        }))
        .build();

    let response = Dispatcher::default()
        .dispatch(&endpoint, post_json("/people", r#"{"name":"ada","age":36}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    assert_eq!(response.body(), &Body::Text("ADA".into()));
}

#[tokio::test]
async fn test_blocking_validation_failure_skips_pool() {
    let dispatcher = Dispatcher::default();
    let endpoint = Endpoint::builder("people")
        .submit(Operation::blocking_with_data(|_req, _person: Person| {
            Ok::<_, anyhow::Error>(())
        }))
        .build();

    let response = dispatcher
        .dispatch(&endpoint, post_json("/people", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(dispatcher.pool().metrics().completed_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_saturated_pool_sheds() {
    let dispatcher = dispatcher(1, BackpressureMode::Shed);
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let release_rx = Arc::new(parking_lot::Mutex::new(release_rx));

    let endpoint = Arc::new(
        Endpoint::builder("slow")
            .fetch(Operation::blocking(move |_req| {
                let _ = started_tx.send(());
                let _ = release_rx.lock().recv_timeout(Duration::from_secs(5));
                Ok::<_, anyhow::Error>(())
            }))
            .build(),
    );

    let first = {
        let dispatcher = dispatcher.clone();
        let endpoint = endpoint.clone();
        tokio::spawn(async move { dispatcher.dispatch(&endpoint, get("/slow")).await })
    };
    tokio::task::spawn_blocking(move || started_rx.recv_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();

    let err = dispatcher
        .dispatch(&endpoint, get("/slow"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Overloaded(_)));
    assert_eq!(dispatcher.pool().metrics().shed_count(), 1);

    release_tx.send(()).unwrap();
    let response = first.await.unwrap().unwrap();
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn test_panicking_operation_is_reported() {
    let endpoint = Endpoint::builder("panics")
        .fetch(Operation::blocking(|_req| -> anyhow::Result<()> {
            panic!("worker exploded")
        }))
        .build();

    let dispatcher = Dispatcher::default();
    let err = dispatcher
        .dispatch(&endpoint, get("/panics"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::WorkerPanicked(_)));
    assert_eq!(dispatcher.pool().in_flight(), 0);
}
