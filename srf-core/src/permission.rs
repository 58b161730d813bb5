//! Permission rules evaluated before any operation runs

use crate::endpoint::Endpoint;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use http::{Method, StatusCode};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Message used by rules that do not override [`Permission::message`]
pub const DEFAULT_DENIAL_MESSAGE: &str = "You do not have permission to perform that action.";

/// One authorization rule.
///
/// Rules are instantiated fresh for every request, so implementations hold
/// configuration only and never per-request state.
#[async_trait]
pub trait Permission: Send + Sync {
    /// Response body when this rule denies
    fn message(&self) -> &str {
        DEFAULT_DENIAL_MESSAGE
    }

    /// Response status when this rule denies
    fn status_code(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }

    /// Decide whether `request` may reach `endpoint`
    async fn has_permission(&self, _request: &Request, _endpoint: &Endpoint) -> bool {
        true
    }
}

/// The outcome of a denying rule
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct Denial {
    /// Status the response carries
    pub status: StatusCode,
    /// Text the response carries
    pub message: String,
}

impl Denial {
    /// Render as a plain-text response
    pub fn into_response(self) -> Response {
        Response::text(self.status, self.message)
    }
}

type PermissionFactory = Arc<dyn Fn() -> Box<dyn Permission> + Send + Sync>;

/// Ordered list of rules attached to an endpoint
#[derive(Clone, Default)]
pub struct Permissions {
    rules: Vec<(&'static str, PermissionFactory)>,
}

impl Permissions {
    /// No rules; every request is allowed
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule built with `P::default()`
    pub fn add<P>(&mut self)
    where
        P: Permission + Default + 'static,
    {
        self.add_with(P::default);
    }

    /// Append a rule built by `factory` for each request
    pub fn add_with<P, F>(&mut self, build: F)
    where
        P: Permission + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        let factory: PermissionFactory =
            Arc::new(move || Box::new(build()) as Box<dyn Permission>);
        self.rules.push((std::any::type_name::<P>(), factory));
    }

    /// Number of declared rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are declared
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate rules in declaration order, stopping at the first denial
    pub async fn check(&self, request: &Request, endpoint: &Endpoint) -> Result<(), Denial> {
        for (name, factory) in &self.rules {
            let rule = factory();
            trace!(rule = name, "Evaluating permission");

            if !rule.has_permission(request, endpoint).await {
                debug!(rule = name, status = %rule.status_code(), "Permission denied");
                return Err(Denial {
                    status: rule.status_code(),
                    message: rule.message().to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Allows every request
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAny;

#[async_trait]
impl Permission for AllowAny {}

/// Denies every request with 403
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl Permission for DenyAll {
    async fn has_permission(&self, _request: &Request, _endpoint: &Endpoint) -> bool {
        false
    }
}

/// Allows only GET, HEAD and OPTIONS
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

#[async_trait]
impl Permission for ReadOnly {
    async fn has_permission(&self, request: &Request, _endpoint: &Endpoint) -> bool {
        matches!(
            *request.method(),
            Method::GET | Method::HEAD | Method::OPTIONS
        )
    }
}

/// Denies with 401 unless the named header is present and non-empty
#[derive(Debug, Clone)]
pub struct RequireHeader {
    header: String,
}

impl RequireHeader {
    /// Require `header` on every request
    pub fn new(header: impl Into<String>) -> Self {
        RequireHeader {
            header: header.into(),
        }
    }
}

#[async_trait]
impl Permission for RequireHeader {
    fn message(&self) -> &str {
        "Authentication credentials were not provided."
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    async fn has_permission(&self, request: &Request, _endpoint: &Endpoint) -> bool {
        request
            .header(&self.header)
            .is_some_and(|value| !value.trim().is_empty())
    }
}
