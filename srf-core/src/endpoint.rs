//! Endpoints: one operation per verb, plus the rules guarding them

use crate::error::DispatchError;
use crate::permission::{Permission, Permissions};
use crate::request::Request;
use crate::response::{IntoReply, Reply, Response};
use crate::schema::{Schema, Validate};
use futures::future::{BoxFuture, FutureExt};
use http::header::{HeaderValue, ALLOW};
use http::{Method, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

type AsyncCall =
    Arc<dyn Fn(Arc<Request>, Option<Value>) -> BoxFuture<'static, Result<Reply, DispatchError>> + Send + Sync>;
type BlockingCall =
    Arc<dyn Fn(&Request, Option<Value>) -> Result<Reply, DispatchError> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Invoke {
    Async(AsyncCall),
    Blocking(BlockingCall),
}

/// Where an operation's untyped input comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Query-string parameters
    Query,
    /// JSON request body
    JsonBody,
}

impl DataSource {
    /// POST, PUT and PATCH read the body; every other verb reads the query
    pub fn for_method(method: &Method) -> Self {
        match *method {
            Method::POST | Method::PUT | Method::PATCH => DataSource::JsonBody,
            _ => DataSource::Query,
        }
    }
}

/// Verb-specific logic of an endpoint
#[derive(Clone)]
pub struct Operation {
    pub(crate) invoke: Invoke,
    schema: Option<Arc<Schema>>,
    data_type: Option<&'static str>,
}

impl Operation {
    /// Async operation without typed input
    pub fn new<F, Fut, R>(handler: F) -> Self
    where
        F: Fn(Arc<Request>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: IntoReply,
    {
        let call: AsyncCall = Arc::new(move |request: Arc<Request>, _data: Option<Value>| {
            let fut = handler(request);
            async move { finish(fut.await) }.boxed()
        });

        Operation {
            invoke: Invoke::Async(call),
            schema: None,
            data_type: None,
        }
    }

    /// Async operation whose input is validated against `T::schema()`
    pub fn with_data<T, F, Fut, R>(handler: F) -> Self
    where
        T: Validate,
        F: Fn(Arc<Request>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: IntoReply,
    {
        let handler = Arc::new(handler);
        let call: AsyncCall = Arc::new(move |request: Arc<Request>, data: Option<Value>| {
            let handler = handler.clone();
            async move {
                let data = decode::<T>(data)?;
                finish(handler(request, data).await)
            }
            .boxed()
        });

        Operation {
            invoke: Invoke::Async(call),
            schema: Some(Arc::new(T::schema())),
            data_type: Some(std::any::type_name::<T>()),
        }
    }

    /// Blocking operation without typed input, run on the worker pool
    pub fn blocking<F, R>(handler: F) -> Self
    where
        F: Fn(&Request) -> anyhow::Result<R> + Send + Sync + 'static,
        R: IntoReply,
    {
        let call: BlockingCall =
            Arc::new(move |request: &Request, _data: Option<Value>| finish(handler(request)));

        Operation {
            invoke: Invoke::Blocking(call),
            schema: None,
            data_type: None,
        }
    }

    /// Blocking operation with validated input, run on the worker pool
    pub fn blocking_with_data<T, F, R>(handler: F) -> Self
    where
        T: Validate,
        F: Fn(&Request, T) -> anyhow::Result<R> + Send + Sync + 'static,
        R: IntoReply,
    {
        let call: BlockingCall = Arc::new(move |request: &Request, data: Option<Value>| {
            let data = decode::<T>(data)?;
            finish(handler(request, data))
        });

        Operation {
            invoke: Invoke::Blocking(call),
            schema: Some(Arc::new(T::schema())),
            data_type: Some(std::any::type_name::<T>()),
        }
    }

    /// Stub that answers 405 with an empty body
    pub fn unimplemented() -> Self {
        Operation::new(|_request| async { Ok::<_, anyhow::Error>(Reply::Unimplemented) })
    }

    /// Schema the input is validated against, if any
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_deref()
    }

    /// Name of the declared input type, if any
    pub fn data_type(&self) -> Option<&'static str> {
        self.data_type
    }

    /// True when the operation runs on the worker pool
    pub fn is_blocking(&self) -> bool {
        matches!(self.invoke, Invoke::Blocking(_))
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("blocking", &self.is_blocking())
            .field("data_type", &self.data_type)
            .finish()
    }
}

fn finish<R: IntoReply>(result: anyhow::Result<R>) -> Result<Reply, DispatchError> {
    result
        .and_then(IntoReply::into_reply)
        .map_err(DispatchError::Handler)
}

fn decode<T: Validate>(data: Option<Value>) -> Result<T, DispatchError> {
    serde_json::from_value(data.unwrap_or(Value::Null)).map_err(|source| {
        DispatchError::DataMismatch {
            type_name: std::any::type_name::<T>(),
            source,
        }
    })
}

/// A logical resource exposing one operation per verb
pub struct Endpoint {
    name: String,
    operations: IndexMap<Method, Operation>,
    permissions: Permissions,
}

impl Endpoint {
    /// Start an endpoint with no operations
    pub fn builder(name: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(name)
    }

    /// Start a form endpoint: `fetch` (GET) and `submit` (POST) answer 405
    /// until replaced, and OPTIONS answers 200 with an `Allow` header.
    pub fn form(name: impl Into<String>) -> EndpointBuilder {
        let mut builder = EndpointBuilder::new(name)
            .fetch(Operation::unimplemented())
            .submit(Operation::unimplemented());
        builder.auto_options = true;
        builder
    }

    /// Endpoint name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules guarding every operation
    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    /// Operation answering `method`; HEAD resolves to GET
    pub fn resolve(&self, method: &Method) -> Option<&Operation> {
        let method = if *method == Method::HEAD {
            &Method::GET
        } else {
            method
        };
        self.operations.get(method)
    }

    /// Verbs this endpoint answers, in registration order
    pub fn allowed_methods(&self) -> Vec<Method> {
        allowed_methods(&self.operations)
    }

    /// Value for an `Allow` header
    pub fn allow_header(&self) -> HeaderValue {
        allow_header(&self.operations)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("methods", &self.allowed_methods())
            .field("permissions", &self.permissions)
            .finish()
    }
}

fn allowed_methods(operations: &IndexMap<Method, Operation>) -> Vec<Method> {
    let mut methods: Vec<Method> = operations.keys().cloned().collect();
    if operations.contains_key(&Method::GET) {
        methods.push(Method::HEAD);
    }
    methods
}

fn allow_header(operations: &IndexMap<Method, Operation>) -> HeaderValue {
    let methods = allowed_methods(operations);
    let listed: Vec<&str> = methods.iter().map(Method::as_str).collect();
    HeaderValue::from_str(&listed.join(", ")).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Registration-time builder for [`Endpoint`]
pub struct EndpointBuilder {
    name: String,
    operations: IndexMap<Method, Operation>,
    permissions: Permissions,
    auto_options: bool,
}

impl EndpointBuilder {
    fn new(name: impl Into<String>) -> Self {
        EndpointBuilder {
            name: name.into(),
            operations: IndexMap::new(),
            permissions: Permissions::new(),
            auto_options: false,
        }
    }

    /// Operation for GET (and HEAD)
    pub fn fetch(self, operation: Operation) -> Self {
        self.on(Method::GET, operation)
    }

    /// Operation for POST
    pub fn submit(self, operation: Operation) -> Self {
        self.on(Method::POST, operation)
    }

    /// Operation for any other verb. HEAD always resolves to GET and cannot
    /// be registered separately.
    pub fn on(mut self, method: Method, operation: Operation) -> Self {
        if method == Method::HEAD {
            warn!(endpoint = %self.name, "HEAD is served by the GET operation; ignoring");
            return self;
        }
        self.operations.insert(method, operation);
        self
    }

    /// Append a rule built with `P::default()`
    pub fn permission<P>(mut self) -> Self
    where
        P: Permission + Default + 'static,
    {
        self.permissions.add::<P>();
        self
    }

    /// Append a rule built by `factory` for each request
    pub fn permission_with<P, F>(mut self, factory: F) -> Self
    where
        P: Permission + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.permissions.add_with(factory);
        self
    }

    /// Finish the endpoint
    pub fn build(mut self) -> Endpoint {
        if self.auto_options && !self.operations.contains_key(&Method::OPTIONS) {
            let mut methods = self.operations.clone();
            methods.insert(Method::OPTIONS, Operation::unimplemented());
            let allow = allow_header(&methods);

            self.operations.insert(
                Method::OPTIONS,
                Operation::new(move |_request| {
                    let response = Response::empty(StatusCode::OK).with_header(ALLOW, allow.clone());
                    async move { Ok::<_, anyhow::Error>(response) }
                }),
            );
        }

        Endpoint {
            name: self.name,
            operations: self.operations,
            permissions: self.permissions,
        }
    }
}
