//! SRF Core - declarative REST endpoints on an async runtime
//!
//! An [`Endpoint`] maps HTTP verbs to operations. The [`Dispatcher`] runs each
//! request through permission rules, schema validation and the operation,
//! offloading blocking operations to a bounded [`WorkerPool`], and turns
//! every outcome into a [`Response`].

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod monitoring;
pub mod permission;
pub mod request;
pub mod response;
pub mod schema;
pub mod transform;
pub mod worker_pool;

pub use dispatcher::{Dispatcher, Outcome};
pub use endpoint::{DataSource, Endpoint, EndpointBuilder, Operation};
pub use error::{BodyError, DispatchError, PoolError, Result, SchemaError};
pub use permission::{AllowAny, Denial, DenyAll, Permission, Permissions, ReadOnly, RequireHeader};
pub use request::{QueryParams, Request, RequestBuilder};
pub use response::{Body, IntoReply, Json, Reply, Response};
pub use schema::{validate, validate_as, Constraint, Field, FieldType, Pattern, Schema, Validate, ValidationError};
pub use transform::{transform_errors, ErrorMap};
pub use worker_pool::{BackpressureMode, WorkerPool, WorkerPoolConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }
}
