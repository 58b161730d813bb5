//! # Request Dispatcher
//!
//! Drives one request through the endpoint pipeline:
//!
//! 1. resolve the operation for the verb (HEAD resolves to GET)
//! 2. evaluate the endpoint's permission rules in order
//! 3. validate the query or JSON body against the operation's schema
//! 4. invoke the operation, on the worker pool when it is blocking
//! 5. normalize the operation's reply into a response
//!
//! Every early exit is a response, never an error. Errors are reserved for
//! failures the pipeline cannot answer for: handler errors, a saturated or
//! panicking worker pool, and a body the runtime could not deliver.

use crate::endpoint::{DataSource, Endpoint, Invoke, Operation};
use crate::error::{DispatchError, Result};
use crate::monitoring::{self, DispatchStats};
use crate::request::Request;
use crate::response::{Reply, Response};
use crate::schema::{Schema, ROOT_PATH};
use crate::transform::{transform_errors, ErrorMap};
use crate::worker_pool::{WorkerPool, WorkerPoolConfig};
use http::header::ALLOW;
use http::{Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, trace};

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// No operation for the verb
    MethodNotAllowed,
    /// A permission rule denied the request
    Denied,
    /// The JSON body could not be parsed
    MalformedBody,
    /// The input failed schema validation
    Invalid,
    /// The operation is a stub
    Unimplemented,
    /// The operation ran and its reply was normalized
    Completed,
    /// The pipeline failed with an error
    Failed,
}

impl Outcome {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::MethodNotAllowed => "method_not_allowed",
            Outcome::Denied => "denied",
            Outcome::MalformedBody => "malformed_body",
            Outcome::Invalid => "invalid",
            Outcome::Unimplemented => "unimplemented",
            Outcome::Completed => "completed",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input stage result: validated data, or the response that ends the dispatch
enum Input {
    Ready(Option<Value>),
    Rejected(Outcome, Response),
}

/// Runs requests through endpoints.
///
/// Cheap to clone; clones share the worker pool and statistics.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: WorkerPool,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    /// Dispatcher backed by `pool` for blocking operations
    pub fn new(pool: WorkerPool) -> Self {
        monitoring::register_metrics();
        Self {
            pool,
            stats: Arc::new(DispatchStats::new()),
        }
    }

    /// Dispatcher with a pool configured from the environment
    pub fn from_env() -> Self {
        Self::new(WorkerPool::new(WorkerPoolConfig::from_env()))
    }

    /// Worker pool used for blocking operations
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Dispatch counters
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Drive `request` through `endpoint`.
    ///
    /// The handler is invoked at most once, and only after every permission
    /// rule allowed and the input validated. Dropping the returned future
    /// abandons the dispatch; a blocking operation already running finishes
    /// on its worker and its result is discarded.
    #[instrument(
        skip_all,
        fields(
            endpoint = %endpoint.name(),
            method = %request.method(),
            request_id = %request.request_id(),
        )
    )]
    pub async fn dispatch(&self, endpoint: &Endpoint, request: Request) -> Result<Response> {
        let start = Instant::now();
        let is_head = *request.method() == Method::HEAD;

        let result = self.run(endpoint, Arc::new(request)).await;
        let elapsed = start.elapsed();

        match result {
            Ok((outcome, response)) => {
                self.stats.record(outcome.as_str(), elapsed);
                monitoring::record_dispatch(endpoint.name(), outcome.as_str(), elapsed);
                crate::trace_dispatch!(endpoint.name(), outcome, response.status(), elapsed);

                Ok(if is_head {
                    response.without_body()
                } else {
                    response
                })
            }
            Err(err) => {
                let outcome = Outcome::Failed;
                self.stats.record(outcome.as_str(), elapsed);
                monitoring::record_dispatch(endpoint.name(), outcome.as_str(), elapsed);
                crate::trace_dispatch_error!(endpoint.name(), err, elapsed);
                Err(err)
            }
        }
    }

    async fn run(&self, endpoint: &Endpoint, request: Arc<Request>) -> Result<(Outcome, Response)> {
        let Some(operation) = endpoint.resolve(request.method()) else {
            debug!("No operation registered for verb");
            return Ok((Outcome::MethodNotAllowed, method_not_allowed(endpoint)));
        };

        if let Err(denial) = endpoint.permissions().check(&request, endpoint).await {
            debug!(status = %denial.status, "Request denied");
            return Ok((Outcome::Denied, denial.into_response()));
        }
        trace!("Permissions passed");

        let data = match operation.schema() {
            Some(schema) => match read_input(schema, &request).await? {
                Input::Ready(data) => data,
                Input::Rejected(outcome, response) => return Ok((outcome, response)),
            },
            None => None,
        };

        let reply = self.invoke(operation, request, data).await?;
        Ok(normalize(reply))
    }

    async fn invoke(
        &self,
        operation: &Operation,
        request: Arc<Request>,
        data: Option<Value>,
    ) -> Result<Reply> {
        match &operation.invoke {
            Invoke::Async(call) => {
                trace!("Invoking async operation");
                call(request, data).await
            }
            Invoke::Blocking(call) => {
                trace!(in_flight = self.pool.in_flight(), "Offloading blocking operation");
                let call = call.clone();
                self.pool.run(move || call(&request, data)).await?
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(WorkerPool::default())
    }
}

async fn read_input(schema: &Schema, request: &Request) -> Result<Input> {
    let raw = match DataSource::for_method(request.method()) {
        DataSource::Query => Value::Object(request.query().to_object()),
        DataSource::JsonBody => match request.json::<Value>().await {
            Ok(value) => value,
            Err(err) if err.is_malformed() => {
                debug!(error = %err, "Rejecting malformed body");
                let mut errors = ErrorMap::new();
                errors.push(ROOT_PATH, err.to_string());
                return Ok(Input::Rejected(
                    Outcome::MalformedBody,
                    Response::json_with_status(StatusCode::BAD_REQUEST, errors.to_json()),
                ));
            }
            Err(err) => return Err(DispatchError::BodyRead(err)),
        },
    };

    match schema.validate(&raw) {
        Ok(data) => Ok(Input::Ready(Some(data))),
        Err(errors) => {
            debug!(errors = errors.len(), "Input failed validation");
            let body = transform_errors(&errors).to_json();
            Ok(Input::Rejected(
                Outcome::Invalid,
                Response::json_with_status(StatusCode::BAD_REQUEST, body),
            ))
        }
    }
}

fn method_not_allowed(endpoint: &Endpoint) -> Response {
    Response::text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
        .with_header(ALLOW, endpoint.allow_header())
}

fn normalize(reply: Reply) -> (Outcome, Response) {
    match reply {
        Reply::Empty => (Outcome::Completed, Response::empty(StatusCode::NO_CONTENT)),
        Reply::Json(value) => (Outcome::Completed, Response::json(value)),
        Reply::Response(response) => (Outcome::Completed, response),
        Reply::Unimplemented => (
            Outcome::Unimplemented,
            Response::empty(StatusCode::METHOD_NOT_ALLOWED),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Body;
    use serde_json::json;

    fn get(endpoint: &str) -> Request {
        Request::builder(Method::GET).path(endpoint).build().unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Reply::Empty).1.status(), StatusCode::NO_CONTENT);
        let (outcome, response) = normalize(Reply::Json(json!({"a": 1})));
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(response.body(), &Body::Json(json!({"a": 1})));

        let (outcome, response) = normalize(Reply::Unimplemented);
        assert_eq!(outcome, Outcome::Unimplemented);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.body(), &Body::Empty);

        let custom = Response::text(StatusCode::ACCEPTED, "queued");
        assert_eq!(normalize(Reply::Response(custom.clone())).1, custom);
    }

    #[tokio::test]
    async fn test_stats_follow_outcomes() {
        let dispatcher = Dispatcher::default();
        let endpoint = Endpoint::builder("stats")
            .fetch(Operation::new(|_req| async { Ok::<_, anyhow::Error>(()) }))
            .build();

        dispatcher.dispatch(&endpoint, get("/stats")).await.unwrap();
        dispatcher
            .dispatch(&endpoint, Request::builder(Method::DELETE).build().unwrap())
            .await
            .unwrap();

        assert_eq!(dispatcher.stats().total(), 2);
        assert_eq!(dispatcher.stats().count("completed"), 1);
        assert_eq!(dispatcher.stats().count("method_not_allowed"), 1);
    }

    #[tokio::test]
    async fn test_handler_error_is_counted_as_failed() {
        let dispatcher = Dispatcher::default();
        let endpoint = Endpoint::builder("broken")
            .fetch(Operation::new(|_req| async {
                Err::<(), _>(anyhow::anyhow!("database unavailable"))
            }))
            .build();

        let err = dispatcher.dispatch(&endpoint, get("/broken")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Handler(_)));
        assert_eq!(dispatcher.stats().count("failed"), 1);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::MethodNotAllowed.to_string(), "method_not_allowed");
        assert_eq!(Outcome::MalformedBody.as_str(), "malformed_body");
    }
}
