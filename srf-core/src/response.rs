//! Responses and operation return values

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// Response body
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// No body
    Empty,
    /// JSON document
    Json(Value),
    /// Plain text
    Text(String),
    /// Raw bytes with the content type set in the headers
    Bytes(Bytes),
}

/// Response produced by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// Response with the given status and no body
    pub fn empty(status: StatusCode) -> Self {
        Response {
            status,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    /// 200 JSON response
    pub fn json(value: Value) -> Self {
        Self::json_with_status(StatusCode::OK, value)
    }

    /// JSON response with an explicit status
    pub fn json_with_status(status: StatusCode, value: Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Response {
            status,
            headers,
            body: Body::Json(value),
        }
    }

    /// Plain-text response
    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Response {
            status,
            headers,
            body: Body::Text(text.into()),
        }
    }

    /// Raw bytes with the given content type
    pub fn bytes(status: StatusCode, content_type: HeaderValue, bytes: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, content_type);
        Response {
            status,
            headers,
            body: Body::Bytes(bytes.into()),
        }
    }

    /// Add or replace a header
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Drop the body, keeping status and headers (HEAD responses)
    pub fn without_body(mut self) -> Self {
        self.body = Body::Empty;
        self
    }

    /// Split into parts for the runtime to emit
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Body) {
        (self.status, self.headers, self.body)
    }

    /// Encoded body bytes
    pub fn body_bytes(&self) -> Bytes {
        match &self.body {
            Body::Empty => Bytes::new(),
            Body::Json(value) => Bytes::from(value.to_string()),
            Body::Text(text) => Bytes::from(text.clone()),
            Body::Bytes(bytes) => bytes.clone(),
        }
    }
}

/// What an operation hands back to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Nothing to return; becomes 204
    Empty,
    /// Serializable value; becomes 200 JSON
    Json(Value),
    /// Fully formed response, passed through unchanged
    Response(Response),
    /// The endpoint does not support this operation; becomes 405
    Unimplemented,
}

impl Reply {
    /// Serialize any value into a JSON reply
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Reply::Json(serde_json::to_value(value)?))
    }
}

/// Conversion of operation return values into a [`Reply`]
pub trait IntoReply {
    /// Perform the conversion
    fn into_reply(self) -> anyhow::Result<Reply>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> anyhow::Result<Reply> {
        Ok(self)
    }
}

impl IntoReply for () {
    fn into_reply(self) -> anyhow::Result<Reply> {
        Ok(Reply::Empty)
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> anyhow::Result<Reply> {
        Ok(Reply::Response(self))
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> anyhow::Result<Reply> {
        Ok(Reply::Json(self))
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> anyhow::Result<Reply> {
        match self {
            Some(inner) => inner.into_reply(),
            None => Ok(Reply::Empty),
        }
    }
}

/// Wrapper that serializes any `T: Serialize` into a JSON reply
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> anyhow::Result<Reply> {
        Ok(Reply::json(&self.0)?)
    }
}
