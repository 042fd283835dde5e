//! HTTP submission and inspection API.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lanework_core::LaneworkError;
use lanework_core::app::{JobService, SubmitRequest};
use lanework_core::domain::JobView;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Job not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LaneworkError> for ApiError {
    fn from(err: LaneworkError) -> Self {
        match err {
            LaneworkError::Validation(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Internal(detail) => {
                error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn router(service: JobService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", post(create_job))
        .route("/jobs/{id}", get(get_job))
        .with_state(service)
}

async fn health() -> &'static str {
    "OK"
}

async fn create_job(
    State(service): State<JobService>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    // an unreadable body is treated like one without the required fields
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let id = service.submit(request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "jobId": id }))))
}

async fn get_job(
    State(service): State<JobService>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobView>> {
    service
        .get(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use lanework_core::app::AppBuilder;
    use lanework_core::impls::InMemoryJobStore;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new());
        let app = AppBuilder::new().store(store.clone()).build().unwrap();
        (router(app.service()), store)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn post_json(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/jobs")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (router, _) = app();
        let response = router.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn submit_then_fetch() {
        let (router, _) = app();

        let (status, body) = send(
            router.clone(),
            post_json(json!({"type": "CSV_EXPORT", "payload": {"data": [{"a": 1}]}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["jobId"].as_str().unwrap().to_string();

        let (status, job) = send(router, get(&format!("/jobs/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(job["id"], id.as_str());
        assert_eq!(job["type"], "CSV_EXPORT");
        assert_eq!(job["status"], "pending");
        assert_eq!(job["priority"], "default");
        assert_eq!(job["attempts"], 0);
        assert!(job["result"].is_null() && job["error"].is_null());
        assert!(job["createdAt"].is_string() && job["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn missing_fields_are_bad_request() {
        let (router, _) = app();
        let (status, body) = send(router, post_json(json!({"type": "CSV_EXPORT"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Type and payload are required");
    }

    #[tokio::test]
    async fn non_json_body_is_bad_request() {
        let (router, _) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/jobs")
            .body(Body::from("type=CSV_EXPORT"))
            .unwrap();
        let (status, _) = send(router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_priority_is_bad_request() {
        let (router, _) = app();
        let (status, _) = send(
            router,
            post_json(json!({"type": "CSV_EXPORT", "priority": "urgent", "payload": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let (router, _) = app();
        for uri in ["/jobs/not-a-valid-id", "/jobs/job-01ARZ3NDEKTSV4RRFFQ69G5FAV"] {
            let (status, body) = send(router.clone(), get(uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["error"], "Job not found");
        }
    }

    #[tokio::test]
    async fn store_outage_is_internal_error() {
        let (router, store) = app();
        store.set_available(false);
        let (status, body) = send(router, post_json(json!({"type": "CSV_EXPORT", "payload": {}}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
    }
}
