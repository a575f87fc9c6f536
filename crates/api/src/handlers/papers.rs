//! Paper browsing handlers

use axum::{extract::Path, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ValidatedQuery;
use crate::dependencies::SessionDep;
use paper_curator_common::{
    db::{models::Paper, PaperRepository},
    errors::{AppError, Result},
};

/// Pagination for the paper listing
#[derive(Debug, Deserialize, Validate)]
pub struct ListPapersQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u64,

    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 { 10 }

#[derive(Debug, Serialize, Deserialize)]
pub struct PaperResponse {
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub categories: Vec<String>,
    pub published_date: String,
    pub pdf_url: String,
    pub pdf_processed: bool,
}

impl From<Paper> for PaperResponse {
    fn from(paper: Paper) -> Self {
        Self {
            authors: paper.author_names(),
            categories: paper.category_codes(),
            published_date: paper.published_date.to_rfc3339(),
            arxiv_id: paper.arxiv_id,
            title: paper.title,
            abstract_text: paper.abstract_text,
            pdf_url: paper.pdf_url,
            pdf_processed: paper.pdf_processed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaperListResponse {
    pub papers: Vec<PaperResponse>,
    pub limit: u64,
    pub offset: u64,
    pub count: usize,
}

/// List stored papers, newest publication first
pub async fn list_papers(
    ValidatedQuery(params): ValidatedQuery<ListPapersQuery>,
    SessionDep(session): SessionDep,
) -> Result<Json<PaperListResponse>> {
    let papers = PaperRepository::new(session.conn())
        .list(params.limit, params.offset)
        .await?;
    session.commit().await?;

    let papers: Vec<PaperResponse> = papers.into_iter().map(PaperResponse::from).collect();

    Ok(Json(PaperListResponse {
        count: papers.len(),
        papers,
        limit: params.limit,
        offset: params.offset,
    }))
}

/// Get a paper by its arXiv identifier
pub async fn get_paper(
    SessionDep(session): SessionDep,
    Path(arxiv_id): Path<String>,
) -> Result<Json<PaperResponse>> {
    let paper = PaperRepository::new(session.conn())
        .find_by_arxiv_id(&arxiv_id)
        .await?
        .ok_or_else(|| AppError::PaperNotFound {
            arxiv_id: arxiv_id.clone(),
        })?;
    session.commit().await?;

    Ok(Json(PaperResponse::from(paper)))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_util::{app, get, json_body};
    use crate::state::test_support::state_with;
    use axum::http::StatusCode;
    use chrono::{TimeZone, Utc};
    use paper_curator_common::db::models::Paper;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn paper(arxiv_id: &str) -> Paper {
        let published = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        Paper {
            id: Uuid::new_v4(),
            arxiv_id: arxiv_id.to_string(),
            title: "Planning with Language Agents".to_string(),
            authors: json!(["Grace Hopper", "Edsger Dijkstra"]),
            abstract_text: "Agents that plan.".to_string(),
            categories: json!(["cs.AI"]),
            published_date: published.into(),
            pdf_url: format!("https://arxiv.org/pdf/{}", arxiv_id),
            raw_text: None,
            pdf_processed: true,
            created_at: published.into(),
            updated_at: published.into(),
        }
    }

    #[tokio::test]
    async fn test_get_paper() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![paper("2403.00001")]])
            .into_connection();
        let state = state_with(conn);

        let response = app(state.clone())
            .oneshot(get("/api/v1/papers/2403.00001"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["arxiv_id"], "2403.00001");
        assert_eq!(body["authors"], json!(["Grace Hopper", "Edsger Dijkstra"]));
        assert_eq!(body["abstract"], "Agents that plan.");
        assert_eq!(body["pdf_processed"], true);
        assert_eq!(state.database.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_get_missing_paper_is_404() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Paper>::new()])
            .into_connection();
        let state = state_with(conn);

        let response = app(state.clone())
            .oneshot(get("/api/v1/papers/2403.99999"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "PAPER_NOT_FOUND");
        assert_eq!(state.database.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_list_papers() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![paper("2403.00002"), paper("2403.00001")]])
            .into_connection();
        let state = state_with(conn);

        let response = app(state)
            .oneshot(get("/api/v1/papers?limit=2&offset=4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["limit"], 2);
        assert_eq!(body["offset"], 4);
        assert_eq!(body["papers"][0]["arxiv_id"], "2403.00002");
    }

    #[tokio::test]
    async fn test_list_papers_rejects_large_limit() {
        let state = state_with(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let response = app(state.clone())
            .oneshot(get("/api/v1/papers?limit=500"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"]["field"], "limit");
        assert_eq!(state.database.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_malformed_query_is_validation_error() {
        let state = state_with(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let response = app(state.clone())
            .oneshot(get("/api/v1/papers?limit=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"].as_str().unwrap().contains("limit"));
        assert_eq!(state.database.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_bad_query_is_rejected_before_session() {
        // A disconnected pool fails every session with a 500
        let state = state_with(DatabaseConnection::default());

        for uri in ["/api/v1/papers?limit=abc", "/api/v1/papers?limit=0"] {
            let response = app(state.clone()).oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }

        let response = app(state).oneshot(get("/api/v1/papers")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
