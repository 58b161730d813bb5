//! Conversion between axum and pipeline requests and responses

use axum::body::Body as AxumBody;
use axum::extract::Request as AxumRequest;
use axum::http::header::CONTENT_LENGTH;
use axum::response::Response as AxumResponse;
use bytes::Bytes;
use futures::FutureExt;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use srf_core::request::BodyFuture;
use srf_core::{BodyError, Request, Response};

/// Header carrying an upstream request identifier
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wrap an axum request without reading its body.
///
/// The body is read at most once, and only if validation or the operation
/// asks for it. A declared `Content-Length` above `max_body_bytes` fails the
/// read without touching the stream.
pub fn into_core_request(
    request: AxumRequest,
    max_body_bytes: usize,
) -> Result<Request, axum::http::Error> {
    let (parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    let body: BodyFuture = match declared {
        Some(len) if len > max_body_bytes => async move {
            Err(BodyError::TooLarge {
                limit: max_body_bytes,
            })
        }
        .boxed(),
        _ => read_limited(body, max_body_bytes).boxed(),
    };

    let mut builder = Request::builder(parts.method)
        .path(parts.uri.path())
        .query(parts.uri.query().unwrap_or_default());

    if let Some(id) = parts
        .headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        builder = builder.request_id(id);
    }

    builder.headers(parts.headers).body_future(body).build()
}

async fn read_limited(body: AxumBody, limit: usize) -> Result<Bytes, BodyError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(BodyError::TooLarge { limit }),
        Err(err) => Err(BodyError::Read(err.to_string())),
    }
}

/// Render a pipeline response for axum
pub fn into_axum_response(response: Response) -> AxumResponse {
    let bytes = response.body_bytes();
    let (status, headers, _) = response.into_parts();

    let mut out = AxumResponse::new(AxumBody::from(bytes));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}
