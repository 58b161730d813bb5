//! SRF HTTP Server - serves pipeline endpoints over axum
//!
//! Each endpoint is mounted as one axum route; every verb on that route goes
//! through the [`srf_core::Dispatcher`].

pub mod adapter;
pub mod api;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod state;
pub mod tracing;

pub use api::HealthResponse;
pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{routing::get, Router};

/// Build the application router: demo endpoints, health checks and metrics
pub fn router(state: AppState) -> Router {
    Router::new()
        // Pipeline endpoints
        .route("/v1/notes", handlers::route(handlers::notes_endpoint(state.notes.clone())))
        .route("/v1/checksum", handlers::route(handlers::checksum_endpoint()))
        .route("/v1/contact", handlers::route(handlers::contact_endpoint()))
        // Health checks
        .route("/health/live", get(handlers::health_live))
        .route("/health/ready", get(handlers::health_ready))
        // Metrics
        .route("/metrics", get(handlers::metrics))
        // Add state
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(ServerConfig::default()))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_router_serves_health() {
        let response = app()
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_router_dispatches_notes_query() {
        let response = app()
            .oneshot(
                Request::get("/v1/notes?page=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["page"].is_array());
    }

    #[tokio::test]
    async fn test_router_rejects_unknown_verb() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/v1/checksum")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");
    }
}
