//! Search handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use validator::Validate;

use super::validation_error;
use crate::dependencies::OpenSearchDep;
use paper_curator_common::{
    errors::{AppError, Result},
    metrics,
    opensearch::{PaperHit, PaperQueryBuilder},
};

/// Search request
#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 500))]
    pub query: String,

    /// Number of hits to return
    #[serde(default = "default_size")]
    #[validate(range(min = 1, max = 50))]
    pub size: usize,

    /// Offset for pagination
    #[serde(default)]
    pub from: usize,

    /// Only papers in any of these categories
    #[serde(default)]
    pub categories: Option<Vec<String>>,

    /// Newest first instead of by relevance
    #[serde(default)]
    pub latest_papers: bool,
}

fn default_size() -> usize { 10 }

/// Search response
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: u64,
    pub hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub arxiv_id: String,
    pub title: String,
    pub authors: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub published_date: Option<String>,
    pub pdf_url: Option<String>,
    pub score: f64,
    pub highlights: Option<Value>,
}

impl From<PaperHit> for SearchHit {
    fn from(hit: PaperHit) -> Self {
        Self {
            arxiv_id: hit.arxiv_id,
            title: hit.title,
            authors: hit.authors,
            abstract_text: hit.abstract_text,
            published_date: hit.published_date,
            pdf_url: hit.pdf_url,
            score: hit.score,
            highlights: hit.highlights,
        }
    }
}

/// BM25 search over the papers index
///
/// A reachable cluster that fails the query still answers 200, with `error`
/// set and no hits.
pub async fn search(
    State(opensearch): OpenSearchDep,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    request.validate().map_err(validation_error)?;

    if !opensearch.health_check().await {
        return Err(AppError::ServiceUnavailable {
            message: "Search service is currently unavailable".to_string(),
        });
    }

    let start = Instant::now();

    let query = PaperQueryBuilder::new(request.query.as_str())
        .size(request.size)
        .offset(request.from)
        .categories(request.categories.clone())
        .latest_papers(request.latest_papers);

    let results = opensearch
        .search_papers(&query)
        .await
        .map_err(|e| AppError::Search {
            message: e.to_string(),
        })?;

    metrics::record_search(
        start.elapsed().as_secs_f64(),
        request.latest_papers,
        results.hits.len(),
    );

    tracing::info!(
        query = %request.query,
        total = results.total,
        returned = results.hits.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Search completed"
    );

    Ok(Json(SearchResponse {
        query: request.query,
        total: results.total,
        hits: results.hits.into_iter().map(SearchHit::from).collect(),
        error: results.error,
    }))
}
