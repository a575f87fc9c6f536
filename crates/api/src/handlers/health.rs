//! Health check handler

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::dependencies::{ArxivDep, DatabaseDep, OpenSearchDep, PdfParserDep, RequestSettings};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub service_name: String,
    pub services: ServiceChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceChecks {
    pub database: CheckResult,
    pub opensearch: CheckResult,
    pub arxiv: ArxivSummary,
    pub pdf_parser: PdfParserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckResult {
    fn healthy(message: impl Into<String>, started: Instant) -> Self {
        Self {
            status: "healthy".to_string(),
            message: Some(message.into()),
            latency_ms: Some(started.elapsed().as_millis() as u64),
        }
    }

    fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            message: Some(message.into()),
            latency_ms: None,
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArxivSummary {
    pub base_url: String,
    pub search_category: String,
    pub max_results: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PdfParserSummary {
    pub max_pages: usize,
    pub max_file_size_mb: u64,
}

/// Report on every dependency
///
/// Always answers 200; `status` is `degraded` when a check fails.
pub async fn health(
    State(settings): RequestSettings,
    State(database): DatabaseDep,
    State(opensearch): OpenSearchDep,
    State(arxiv): ArxivDep,
    State(pdf_parser): PdfParserDep,
) -> Json<HealthResponse> {
    let started = Instant::now();
    let database_check = match database.ping().await {
        Ok(()) => CheckResult::healthy("Connected successfully", started),
        Err(e) => CheckResult::unhealthy(e.to_string()),
    };

    let started = Instant::now();
    let opensearch_check = if !opensearch.health_check().await {
        CheckResult::unhealthy("Not responding")
    } else {
        match opensearch.get_index_stats().await {
            Ok(stats) => CheckResult::healthy(
                format!("Index '{}' with {} documents", stats.index_name, stats.document_count),
                started,
            ),
            Err(e) => CheckResult::unhealthy(e.to_string()),
        }
    };

    let all_healthy = database_check.is_healthy() && opensearch_check.is_healthy();
    if !all_healthy {
        tracing::warn!(
            database = %database_check.status,
            opensearch = %opensearch_check.status,
            "Health check degraded"
        );
    }

    Json(HealthResponse {
        status: if all_healthy { "ok" } else { "degraded" }.to_string(),
        version: settings.app_version.clone(),
        environment: settings.environment.as_str().to_string(),
        service_name: settings.service_name.clone(),
        services: ServiceChecks {
            database: database_check,
            opensearch: opensearch_check,
            arxiv: ArxivSummary {
                base_url: arxiv.base_url().to_string(),
                search_category: arxiv.search_category().to_string(),
                max_results: arxiv.max_results(),
            },
            pdf_parser: PdfParserSummary {
                max_pages: pdf_parser.max_pages(),
                max_file_size_mb: pdf_parser.max_file_size_mb(),
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_util::{app, get, json_body};
    use crate::state::test_support::state_with;
    use axum::http::StatusCode;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_each_service() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let state = state_with(conn);

        let response = app(state).oneshot(get("/api/v1/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["services"]["database"]["status"], "healthy");
        // Nothing listens on the test OpenSearch host
        assert_eq!(body["services"]["opensearch"]["status"], "unhealthy");
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["environment"], "development");
        assert_eq!(body["services"]["arxiv"]["search_category"], "cs.AI");
        assert_eq!(body["services"]["pdf_parser"]["max_pages"], 30);
    }

    #[tokio::test]
    async fn test_health_with_database_down() {
        let state = state_with(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let response = app(state).oneshot(get("/api/v1/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["services"]["database"]["status"], "unhealthy");
        assert!(body["services"]["database"]["message"].is_string());
        assert_eq!(body["status"], "degraded");
    }
}
