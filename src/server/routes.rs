//! API routes for kubequery

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use super::AppState;
use crate::error::AgentError;

type AppStateArc = Arc<AppState>;

/// Body of `POST /query`
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Successful answer
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

pub fn query_routes() -> Router<AppStateArc> {
    Router::new().route("/query", post(query_kubernetes))
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health))
}

async fn query_kubernetes(
    State(state): State<AppStateArc>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        error!("Request validation error: {}", e);
        api_error(StatusCode::BAD_REQUEST, "Invalid request format")
    })?;

    match state.agent.answer(&request.query).await {
        Ok(answer) => Ok(Json(QueryResponse {
            query: request.query,
            answer,
        })),
        Err(AgentError::InvalidRequest(msg)) => {
            error!("Rejected query: {}", msg);
            Err(api_error(StatusCode::BAD_REQUEST, "Query must not be empty"))
        }
        Err(e) => {
            error!("An error occurred: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred while processing your request.",
            ))
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{FakeCluster, ScriptedLlm};
    use crate::agent::QueryAgent;
    use crate::config::AgentConfig;
    use crate::server::router;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::response::Response;
    use tower::ServiceExt;

    fn app(replies: Vec<&str>) -> Router {
        let agent = QueryAgent::new(
            &AgentConfig::default(),
            Arc::new(ScriptedLlm::new(replies)),
            Arc::new(FakeCluster::sample()),
        )
        .unwrap();
        router(Arc::new(AppState { agent }), "http://localhost:3000").unwrap()
    }

    fn post_query(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/query")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_returns_answer() {
        let app = app(vec![
            r#"{"action": "count_resources", "parameters": {"resource_type": "node"}}"#,
        ]);

        let response = app
            .oneshot(post_query(r#"{"query": "How many nodes are there in the cluster?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: QueryResponse = json_body(response).await;
        assert_eq!(body.query, "How many nodes are there in the cluster?");
        assert_eq!(body.answer, "2");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        for body in [r#"{"question": "hi"}"#, r#"{"query": 42}"#, "not json"] {
            let response = app(vec![]).oneshot(post_query(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let error: ErrorResponse = json_body(response).await;
            assert_eq!(error.error, "Invalid request format");
        }
    }

    #[tokio::test]
    async fn test_blank_query() {
        let response = app(vec![])
            .oneshot(post_query(r#"{"query": "  "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_interpretation_failure() {
        let response = app(vec!["no idea"])
            .oneshot(post_query(r#"{"query": "How many pods?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error.error, "An error occurred while processing your request.");
    }

    #[tokio::test]
    async fn test_health_and_cors() {
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app(vec![]).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn test_invalid_cors_origin() {
        let agent = QueryAgent::new(
            &AgentConfig::default(),
            Arc::new(ScriptedLlm::new(vec![])),
            Arc::new(FakeCluster::sample()),
        )
        .unwrap();
        assert!(router(Arc::new(AppState { agent }), "bad\norigin").is_err());
    }
}
