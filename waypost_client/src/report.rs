use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;
use waypost_lib::report::{ReportPayload, ReportReceipt};

/// Bounded wait for a single report request.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum ReportError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

/// Delivers one location report to the backend. No retry: delivery is
/// best-effort, the local log stays authoritative.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report(&self, url: &str, payload: &ReportPayload)
    -> Result<ReportReceipt, ReportError>;
}

/// JSON-over-HTTP reporter with a reusable client and connection pooling.
pub struct HttpReporter {
    http: reqwest::Client,
}

impl HttpReporter {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(REPORT_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self { http }
    }
}

impl Default for HttpReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn report(
        &self,
        url: &str,
        payload: &ReportPayload,
    ) -> Result<ReportReceipt, ReportError> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Status(status.as_u16()));
        }

        response
            .json::<ReportReceipt>()
            .await
            .map_err(|e| ReportError::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::Utc;
    use waypost_lib::location_fix::LocationFix;

    use super::*;

    fn payload() -> ReportPayload {
        let fix = LocationFix::new(37.422, -122.084, Utc::now()).with_accuracy(5.0);
        ReportPayload::from_fix("user-1", &fix)
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/report")
    }

    #[tokio::test]
    async fn delivers_and_returns_receipt_id() {
        let router = Router::new().route(
            "/report",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["user_id"], "user-1");
                assert_eq!(body["latitude"], 37.422);
                assert_eq!(body["longitude"], -122.084);
                assert_eq!(body["accuracy"], 5.0);
                assert!(body["timestamp"].is_string());
                Json(serde_json::json!({ "id": "loc-7" }))
            }),
        );
        let url = serve(router).await;

        let receipt = HttpReporter::new().report(&url, &payload()).await.unwrap();
        assert_eq!(receipt.id, "loc-7");
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let router = Router::new().route(
            "/report",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let url = serve(router).await;

        let err = HttpReporter::new().report(&url, &payload()).await.unwrap_err();
        match err {
            ReportError::Status(500) => {}
            other => panic!("expected Status(500), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_success_body_is_malformed() {
        let router = Router::new().route("/report", post(|| async { "created" }));
        let url = serve(router).await;

        let err = HttpReporter::new().report(&url, &payload()).await.unwrap_err();
        assert!(matches!(err, ReportError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/report");
        let err = HttpReporter::new().report(&url, &payload()).await.unwrap_err();
        assert!(matches!(err, ReportError::Transport(_)));
    }
}
