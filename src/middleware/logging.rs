//! Request logging middleware.
//!
//! Each request runs inside an `http_request` span carrying method and path;
//! status and latency are recorded on the span once the response is ready.

use axum::{body::Body, http::Request, http::StatusCode, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{field, info, info_span, warn, Instrument, Span};

pub const HEALTH_PATH: &str = "/api/health";

/// How a finished request is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Rejected,
    Failed,
}

impl Outcome {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_server_error() {
            Outcome::Failed
        } else if status.is_client_error() {
            Outcome::Rejected
        } else {
            Outcome::Success
        }
    }
}

/// Logs each request once it completes; 5xx at WARN, everything else at INFO.
/// The health check is not logged.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let span = info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        status = field::Empty,
        latency_ms = field::Empty,
    );

    async move {
        let start = Instant::now();
        let response = next.run(request).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        let span = Span::current();
        span.record("status", status.as_u16());
        span.record("latency_ms", latency_ms);

        match Outcome::from_status(status) {
            Outcome::Failed => warn!("Request failed ({})", status),
            Outcome::Rejected => info!("Request rejected ({})", status),
            Outcome::Success => info!("Request completed"),
        }

        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_outcome_by_status_class() {
        assert_eq!(Outcome::from_status(StatusCode::OK), Outcome::Success);
        assert_eq!(Outcome::from_status(StatusCode::CREATED), Outcome::Success);
        assert_eq!(
            Outcome::from_status(StatusCode::UNAUTHORIZED),
            Outcome::Rejected
        );
        assert_eq!(Outcome::from_status(StatusCode::CONFLICT), Outcome::Rejected);
        assert_eq!(
            Outcome::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            Outcome::Failed
        );
    }

    #[tokio::test]
    async fn test_response_passes_through_unchanged() {
        let app = Router::new()
            .route(HEALTH_PATH, get(|| async { "up" }))
            .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
            .layer(middleware::from_fn(request_logging));

        let health = app
            .clone()
            .oneshot(Request::get(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let teapot = app
            .oneshot(Request::get("/teapot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(teapot.status(), StatusCode::IM_A_TEAPOT);
    }
}
