//! HTTP request handlers and the demo endpoints

use crate::adapter::{into_axum_response, into_core_request};
use crate::api::{
    ChecksumInput, ChecksumOutput, ContactMessage, HealthResponse, HealthStatus, NewNote,
    NotePage, NoteQuery,
};
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, NoteStore};
use axum::{
    extract::{Request as AxumRequest, State},
    http::{Method, StatusCode},
    response::Response as AxumResponse,
    routing::{any, MethodRouter},
    Json,
};
use serde_json::json;
use srf_core::{Endpoint, Operation, Permission, Reply, Request, Response};
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

/// Header checked by [`KeyForWrites`]
pub const API_KEY_HEADER: &str = "x-api-key";

/// Mount `endpoint` so every verb goes through the dispatcher
pub fn route(endpoint: Endpoint) -> MethodRouter<AppState> {
    let endpoint = Arc::new(endpoint);
    any(move |State(state): State<AppState>, request: AxumRequest| {
        let endpoint = endpoint.clone();
        async move { dispatch(&state, &endpoint, request).await }
    })
}

/// Run one HTTP request through the pipeline
pub async fn dispatch(
    state: &AppState,
    endpoint: &Endpoint,
    request: AxumRequest,
) -> ApiResult<AxumResponse> {
    let request = into_core_request(request, state.config.max_body_bytes)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request: {}", e)))?;

    let span = crate::tracing::create_request_span(
        endpoint.name(),
        request.method().as_str(),
        request.request_id(),
    );

    async {
        match state.dispatcher.dispatch(endpoint, request).await {
            Ok(response) => {
                crate::tracing::record_status(response.status().as_u16());
                Ok(into_axum_response(response))
            }
            Err(err) => {
                crate::tracing::record_error(&err.to_string());
                warn!(endpoint = endpoint.name(), error = %err, "Dispatch failed");
                Err(ApiError::from_dispatch(err, state.debug()))
            }
        }
    }
    .instrument(span)
    .await
}

/// Allows safe methods; other methods need a non-empty API key header
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyForWrites;

#[async_trait::async_trait]
impl Permission for KeyForWrites {
    fn message(&self) -> &str {
        "Authentication credentials were not provided."
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    async fn has_permission(&self, request: &Request, _endpoint: &Endpoint) -> bool {
        matches!(
            *request.method(),
            Method::GET | Method::HEAD | Method::OPTIONS
        ) || request
            .header(API_KEY_HEADER)
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// `GET` lists notes page by page; `POST` creates one
pub fn notes_endpoint(store: Arc<NoteStore>) -> Endpoint {
    let reader = store.clone();
    let writer = store;

    Endpoint::builder("notes")
        .permission::<KeyForWrites>()
        .fetch(Operation::with_data(move |_req, query: NoteQuery| {
            let store = reader.clone();
            async move {
                let (items, total) = store
                    .page(query.page as usize, query.per_page as usize, query.tag.as_deref())
                    .await;
                Reply::json(&NotePage {
                    items,
                    page: query.page,
                    per_page: query.per_page,
                    total,
                })
                .map_err(anyhow::Error::from)
            }
        }))
        .submit(Operation::with_data(move |_req, new: NewNote| {
            let store = writer.clone();
            async move {
                let note = store.insert(new).await;
                debug!(id = note.id, "Note created");
                Ok::<_, anyhow::Error>(Response::json_with_status(
                    StatusCode::CREATED,
                    serde_json::to_value(&note)?,
                ))
            }
        }))
        .build()
}

/// `POST` digests text on the blocking worker pool
pub fn checksum_endpoint() -> Endpoint {
    Endpoint::builder("checksum")
        .submit(Operation::blocking_with_data(|_req, input: ChecksumInput| {
            let checksum = checksum(input.text.as_bytes(), input.rounds);
            Ok::<_, anyhow::Error>(srf_core::Json(ChecksumOutput {
                checksum: format!("{:016x}", checksum),
                rounds: input.rounds,
            }))
        }))
        .build()
}

/// Form endpoint: `POST` accepts a message; `GET` stays unimplemented
pub fn contact_endpoint() -> Endpoint {
    Endpoint::form("contact")
        .submit(Operation::with_data(|_req, message: ContactMessage| async move {
            debug!(topic = %message.topic, "Contact message accepted");
            Ok::<_, anyhow::Error>(Response::json_with_status(
                StatusCode::ACCEPTED,
                json!({"queued": true, "topic": message.topic}),
            ))
        }))
        .build()
}

/// Iterated FNV-1a over `data`
fn checksum(data: &[u8], rounds: i64) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    for _ in 0..rounds.max(1) {
        for byte in data.iter().chain(hash.to_le_bytes().iter()) {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(PRIME);
        }
    }
    hash
}

fn health(state: &AppState, status: HealthStatus) -> HealthResponse {
    HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        dispatched: state.dispatcher.stats().total(),
        blocking_in_flight: state.dispatcher.pool().in_flight(),
    }
}

/// Health check - liveness probe
pub async fn health_live(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health(&state, HealthStatus::Healthy))
}

/// Health check - readiness probe; not ready while every blocking slot is busy
pub async fn health_ready(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let pool = state.dispatcher.pool();
    if pool.in_flight() >= pool.config().max_blocking {
        warn!(in_flight = pool.in_flight(), "Readiness check failed: worker pool saturated");
        return Err(ApiError::ServiceUnavailable(
            "Blocking worker pool saturated".to_string(),
        ));
    }
    Ok(Json(health(&state, HealthStatus::Healthy)))
}

/// Prometheus metrics endpoint
pub async fn metrics() -> String {
    crate::metrics::get_prometheus_metrics()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_stable_and_round_sensitive() {
        assert_eq!(checksum(b"hello", 1), checksum(b"hello", 1));
        assert_ne!(checksum(b"hello", 1), checksum(b"hello", 2));
        assert_ne!(checksum(b"hello", 1), checksum(b"hellp", 1));
        assert_eq!(checksum(b"x", 0), checksum(b"x", 1));
    }

    #[test]
    fn test_endpoint_shapes() {
        let notes = notes_endpoint(Arc::new(NoteStore::new()));
        assert_eq!(notes.allowed_methods(), vec![Method::GET, Method::POST, Method::HEAD]);
        assert!(checksum_endpoint()
            .resolve(&Method::POST)
            .is_some_and(|op| op.is_blocking()));
        assert_eq!(
            contact_endpoint().allow_header(),
            "GET, POST, OPTIONS, HEAD"
        );
    }

    #[tokio::test]
    async fn test_key_for_writes() {
        let endpoint = Endpoint::builder("guarded").build();
        let rule = KeyForWrites;

        let get = Request::builder(Method::GET).build().unwrap();
        assert!(rule.has_permission(&get, &endpoint).await);

        let post = Request::builder(Method::POST).build().unwrap();
        assert!(!rule.has_permission(&post, &endpoint).await);

        let keyed = Request::builder(Method::POST)
            .header(API_KEY_HEADER, "secret")
            .build()
            .unwrap();
        assert!(rule.has_permission(&keyed, &endpoint).await);
    }
}
