//! Request view handed to permissions and operations

use crate::error::BodyError;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Pending body read supplied by the HTTP runtime
pub type BodyFuture = BoxFuture<'static, Result<Bytes, BodyError>>;

/// Ordered, multi-valued query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a raw (percent-encoded) query string
    pub fn parse(query: &str) -> Self {
        let pairs = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        QueryParams { pairs }
    }

    /// Build from already decoded pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        QueryParams {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Last value given for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value given for `key`, in request order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All pairs in request order, repeats included
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs, repeats included
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no parameters were given
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Untyped validation input. A repeated key keeps its last value.
    pub fn to_object(&self) -> Map<String, Value> {
        let mut object = Map::new();
        for (k, v) in &self.pairs {
            object.insert(k.clone(), Value::String(v.clone()));
        }
        object
    }
}

/// Body that is pulled from the runtime on first use and cached afterwards
///
/// A failed read is remembered, so later calls report the same error.
struct LazyBody {
    pending: Mutex<Option<BodyFuture>>,
    failure: Mutex<Option<BodyError>>,
    bytes: OnceCell<Bytes>,
}

impl LazyBody {
    fn ready(bytes: Bytes) -> Self {
        LazyBody {
            pending: Mutex::new(None),
            failure: Mutex::new(None),
            bytes: OnceCell::new_with(Some(bytes)),
        }
    }

    fn deferred(future: BodyFuture) -> Self {
        LazyBody {
            pending: Mutex::new(Some(future)),
            failure: Mutex::new(None),
            bytes: OnceCell::new(),
        }
    }

    async fn get(&self) -> Result<Bytes, BodyError> {
        self.bytes
            .get_or_try_init(|| async {
                let pending = self.pending.lock().take();
                match pending {
                    Some(future) => future.await.map_err(|err| {
                        *self.failure.lock() = Some(err.replay());
                        err
                    }),
                    None => Err(self.failure.lock().as_ref().map_or_else(
                        || BodyError::Read("body stream already consumed".into()),
                        BodyError::replay,
                    )),
                }
            })
            .await
            .cloned()
    }
}

/// Immutable view over one incoming HTTP request
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: QueryParams,
    body: LazyBody,
    request_id: Arc<str>,
}

impl Request {
    /// Start building a request
    pub fn builder(method: Method) -> RequestBuilder {
        RequestBuilder::new(method)
    }

    /// HTTP verb as received
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, informational only
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, if present and visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Query parameters
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Identifier used to correlate log lines
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Raw body bytes, read from the runtime on first call
    pub async fn body(&self) -> Result<Bytes, BodyError> {
        self.body.get().await
    }

    /// Body parsed as JSON
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        let bytes = self.body().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Request builder for fluent API
pub struct RequestBuilder {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: QueryParams,
    body: Option<LazyBody>,
    request_id: Option<String>,
    error: Option<http::Error>,
}

impl RequestBuilder {
    /// Create a new request builder
    pub fn new(method: Method) -> Self {
        RequestBuilder {
            method,
            path: "/".to_string(),
            headers: HeaderMap::new(),
            query: QueryParams::default(),
            body: None,
            request_id: None,
            error: None,
        }
    }

    /// Set the path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the query from a raw query string
    pub fn query(mut self, raw: &str) -> Self {
        self.query = QueryParams::parse(raw);
        self
    }

    /// Set already decoded query parameters
    pub fn query_params(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Append a header
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if self.error.is_some() {
            return self;
        }
        let name = match HeaderName::try_from(name) {
            Ok(name) => name,
            Err(e) => {
                self.error = Some(e.into());
                return self;
            }
        };
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(e) => self.error = Some(e.into()),
        }
        self
    }

    /// Replace all headers
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Use an in-memory body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(LazyBody::ready(body.into()));
        self
    }

    /// Defer the body read until something asks for it
    pub fn body_future(mut self, future: BodyFuture) -> Self {
        self.body = Some(LazyBody::deferred(future));
        self
    }

    /// Reuse an identifier assigned upstream instead of generating one
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Build the request
    pub fn build(self) -> Result<Request, http::Error> {
        if let Some(err) = self.error {
            return Err(err);
        }

        Ok(Request {
            method: self.method,
            path: self.path,
            headers: self.headers,
            query: self.query,
            body: self.body.unwrap_or_else(|| LazyBody::ready(Bytes::new())),
            request_id: Arc::from(
                self.request_id
                    .unwrap_or_else(generate_request_id)
                    .into_boxed_str(),
            ),
        })
    }
}

/// Generate a unique request ID
fn generate_request_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("req_{:x}_{:x}", timestamp, counter)
}
