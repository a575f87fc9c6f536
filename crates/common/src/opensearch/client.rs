//! OpenSearch REST client
//!
//! Index management, document indexing and BM25 search against the papers
//! index, spoken over plain HTTP with reqwest.

use super::index::{papers_index_mapping, ARXIV_PAPERS_INDEX};
use super::query::PaperQueryBuilder;
use crate::config::OpenSearchSettings;
use crate::db::models::Paper;
use crate::errors::{AppError, Result};
use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A paper as stored in the search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperDocument {
    pub arxiv_id: String,
    pub title: String,
    /// Comma-separated author names
    pub authors: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub categories: Vec<String>,
    pub pdf_url: String,
    pub published_date: String,
    pub raw_text: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Paper> for PaperDocument {
    fn from(paper: &Paper) -> Self {
        Self {
            arxiv_id: paper.arxiv_id.clone(),
            title: paper.title.clone(),
            authors: paper.author_names().join(", "),
            abstract_text: paper.abstract_text.clone(),
            categories: paper.category_codes(),
            pdf_url: paper.pdf_url.clone(),
            published_date: paper.published_date.to_rfc3339(),
            raw_text: paper.raw_text.clone().unwrap_or_default(),
            created_at: paper.created_at.to_rfc3339(),
            updated_at: paper.updated_at.to_rfc3339(),
        }
    }
}

impl PaperDocument {
    /// Cut `raw_text` down to at most `max_chars` characters
    pub fn truncate_raw_text(&mut self, max_chars: usize) {
        if let Some((cut, _)) = self.raw_text.char_indices().nth(max_chars) {
            self.raw_text.truncate(cut);
        }
    }
}

/// A single search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperHit {
    #[serde(default)]
    pub arxiv_id: String,
    #[serde(default)]
    pub title: String,
    pub authors: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub categories: Option<Vec<String>>,
    pub published_date: Option<String>,
    pub pdf_url: Option<String>,
    pub score: f64,
    pub highlights: Option<Value>,
}

/// Search results with the total hit count
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub total: u64,
    pub hits: Vec<PaperHit>,
    pub error: Option<String>,
}

impl SearchResults {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Document count and size of the papers index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub index_name: String,
    pub document_count: u64,
    pub size_in_bytes: u64,
    pub health: String,
}

/// Outcome of a bulk indexing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIndexSummary {
    pub success: usize,
    pub failed: usize,
}

// Raw response shapes
#[derive(Deserialize)]
struct RawSearchResponse {
    hits: RawHits,
}

#[derive(Deserialize)]
struct RawHits {
    total: RawTotal,
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawTotal {
    value: u64,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Value,
    highlight: Option<Value>,
}

/// Client for the OpenSearch cluster holding the papers index
#[derive(Debug, Clone)]
pub struct OpenSearchClient {
    http: reqwest::Client,
    base_url: Url,
    index_name: String,
    max_text_size: usize,
}

impl OpenSearchClient {
    /// Build a client from settings; no request is sent
    pub fn new(settings: &OpenSearchSettings) -> Result<Self> {
        let base_url = Url::parse(&settings.host).map_err(|e| {
            AppError::Configuration(config::ConfigError::Message(format!(
                "Invalid OpenSearch host '{}': {}",
                settings.host, e
            )))
        })?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;

        let index_name = if settings.index_name.is_empty() {
            ARXIV_PAPERS_INDEX.to_string()
        } else {
            settings.index_name.clone()
        };

        info!(host = %base_url, index = %index_name, "OpenSearch client initialized");

        Ok(Self {
            http,
            base_url,
            index_name,
            max_text_size: settings.max_text_size,
        })
    }

    pub fn host(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Build `{host}/{segments...}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::OpenSearch {
                message: format!("Host URL cannot be a base: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, segments: &[&str]) -> Result<Value> {
        let response = self.http.get(self.endpoint(segments)?).send().await?;
        Self::json_body(response).await
    }

    /// Decode a JSON body, turning non-2xx statuses into errors
    async fn json_body(response: Response) -> Result<Value> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::OpenSearch {
            message: format!("{}: {}", status, body),
        })
    }

    /// True when the cluster reports green or yellow
    pub async fn health_check(&self) -> bool {
        match self.get_cluster_health().await {
            Ok(health) => matches!(health["status"].as_str(), Some("green") | Some("yellow")),
            Err(e) => {
                error!(error = %e, "OpenSearch health check failed");
                false
            }
        }
    }

    pub async fn get_cluster_health(&self) -> Result<Value> {
        self.get_json(&["_cluster", "health"]).await
    }

    /// Cluster name and version as reported by the root endpoint
    pub async fn get_cluster_info(&self) -> Result<Value> {
        self.get_json(&[]).await
    }

    pub async fn index_exists(&self) -> Result<bool> {
        let response = self.http.head(self.endpoint(&[self.index_name.as_str()])?).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(AppError::OpenSearch {
                message: format!("Unexpected status checking index {}: {}", self.index_name, status),
            }),
        }
    }

    /// Create the papers index with its mapping
    ///
    /// Returns `false` when the index already exists and `force` is not set.
    /// With `force`, an existing index is deleted first.
    pub async fn create_index(&self, force: bool) -> Result<bool> {
        if self.index_exists().await? {
            if !force {
                info!(index = %self.index_name, "Index already exists");
                return Ok(false);
            }
            info!(index = %self.index_name, "Deleting existing index");
            let response = self.http.delete(self.endpoint(&[self.index_name.as_str()])?).send().await?;
            Self::json_body(response).await?;
        }

        let response = self
            .http
            .put(self.endpoint(&[self.index_name.as_str()])?)
            .json(&papers_index_mapping())
            .send()
            .await?;
        let body = Self::json_body(response).await?;

        if body["acknowledged"].as_bool() == Some(true) {
            info!(index = %self.index_name, "Successfully created index");
            Ok(true)
        } else {
            error!(index = %self.index_name, response = %body, "Index creation not acknowledged");
            Ok(false)
        }
    }

    /// Index one paper, making it searchable immediately
    pub async fn index_paper(&self, document: &PaperDocument) -> Result<()> {
        if document.arxiv_id.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Missing arxiv_id in paper document".to_string(),
                field: Some("arxiv_id".to_string()),
            });
        }

        let mut document = document.clone();
        document.truncate_raw_text(self.max_text_size);

        let mut url = self.endpoint(&[self.index_name.as_str(), "_doc", document.arxiv_id.as_str()])?;
        url.query_pairs_mut().append_pair("refresh", "true");

        let response = self.http.put(url).json(&document).send().await?;
        let body = Self::json_body(response).await?;

        match body["result"].as_str() {
            Some("created") | Some("updated") => {
                debug!(arxiv_id = %document.arxiv_id, "Indexed paper");
                Ok(())
            }
            other => Err(AppError::OpenSearch {
                message: format!(
                    "Unexpected result indexing {}: {}",
                    document.arxiv_id,
                    other.unwrap_or("none")
                ),
            }),
        }
    }

    /// Index papers one by one, counting successes and failures
    pub async fn bulk_index_papers(&self, documents: &[PaperDocument]) -> BulkIndexSummary {
        let mut summary = BulkIndexSummary::default();

        for document in documents {
            match self.index_paper(document).await {
                Ok(()) => summary.success += 1,
                Err(e) => {
                    warn!(arxiv_id = %document.arxiv_id, error = %e, "Failed to index paper");
                    summary.failed += 1;
                }
            }
        }

        info!(success = summary.success, failed = summary.failed, "Bulk indexing complete");
        summary
    }

    /// Run a search built by `query`
    ///
    /// Backend failures (missing index, rejected query, unreadable body) yield
    /// empty results carrying the error message rather than an `Err`. Only a
    /// search URL that cannot be built is returned as an error.
    pub async fn search_papers(&self, query: &PaperQueryBuilder) -> Result<SearchResults> {
        let url = self.endpoint(&[self.index_name.as_str(), "_search"])?;

        let response = match self.http.post(url).json(&query.build()).send().await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Search request failed");
                return Ok(SearchResults::failed(AppError::from(e).to_string()));
            }
        };

        if response.status() == StatusCode::NOT_FOUND {
            error!(index = %self.index_name, "Index not found");
            return Ok(SearchResults::failed("Index not found"));
        }

        match Self::json_body(response).await.and_then(parse_search_response) {
            Ok(results) => {
                info!(total = results.total, returned = results.hits.len(), "Search completed");
                Ok(results)
            }
            Err(e) => {
                error!(error = %e, "Search failed");
                Ok(SearchResults::failed(e.to_string()))
            }
        }
    }

    pub async fn get_index_stats(&self) -> Result<IndexStats> {
        let stats = self.get_json(&[self.index_name.as_str(), "_stats"]).await?;
        let count = self.get_json(&[self.index_name.as_str(), "_count"]).await?;
        let health = self.get_json(&["_cluster", "health", self.index_name.as_str()]).await?;

        Ok(IndexStats {
            index_name: self.index_name.clone(),
            document_count: count["count"].as_u64().unwrap_or(0),
            size_in_bytes: stats["indices"][&self.index_name]["total"]["store"]["size_in_bytes"]
                .as_u64()
                .unwrap_or(0),
            health: health["status"].as_str().unwrap_or("unknown").to_string(),
        })
    }
}

/// Turn a raw `_search` response into [`SearchResults`]
fn parse_search_response(body: Value) -> Result<SearchResults> {
    let raw: RawSearchResponse = serde_json::from_value(body)?;

    let hits = raw
        .hits
        .hits
        .into_iter()
        .map(|hit| {
            let mut source = hit.source;
            // Scores are null when sorting by date
            source["score"] = Value::from(hit.score.unwrap_or(0.0));
            source["highlights"] = hit.highlight.unwrap_or(Value::Null);
            serde_json::from_value::<PaperHit>(source)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(SearchResults {
        total: raw.hits.total.value,
        hits,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Paper;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn client() -> OpenSearchClient {
        OpenSearchClient::new(&OpenSearchSettings::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_host() {
        let settings = OpenSearchSettings {
            host: "not a url".into(),
            ..Default::default()
        };
        assert!(OpenSearchClient::new(&settings).is_err());
    }

    #[test]
    fn test_empty_index_name_falls_back() {
        let settings = OpenSearchSettings {
            index_name: String::new(),
            ..Default::default()
        };
        let client = OpenSearchClient::new(&settings).unwrap();
        assert_eq!(client.index_name(), ARXIV_PAPERS_INDEX);
    }

    #[test]
    fn test_endpoint_encodes_old_style_ids() {
        let url = client().endpoint(&["arxiv-papers", "_doc", "cs/0112017"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/arxiv-papers/_doc/cs%2F0112017");
    }

    #[test]
    fn test_endpoint_root() {
        let url = client().endpoint(&[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/");
    }

    #[test]
    fn test_document_from_paper() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let paper = Paper {
            id: Uuid::new_v4(),
            arxiv_id: "2403.00001".into(),
            title: "Planning with LLMs".into(),
            authors: json!(["Grace Hopper", "Edsger Dijkstra"]),
            abstract_text: "We plan.".into(),
            categories: json!(["cs.AI"]),
            published_date: at.into(),
            pdf_url: "https://arxiv.org/pdf/2403.00001".into(),
            raw_text: None,
            pdf_processed: false,
            created_at: at.into(),
            updated_at: at.into(),
        };

        let doc = PaperDocument::from(&paper);
        assert_eq!(doc.authors, "Grace Hopper, Edsger Dijkstra");
        assert_eq!(doc.categories, vec!["cs.AI"]);
        assert_eq!(doc.raw_text, "");
        assert_eq!(doc.published_date, "2024-03-01T09:30:00+00:00");

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["abstract"], "We plan.");
    }

    #[test]
    fn test_truncate_raw_text_on_char_boundary() {
        let mut doc = PaperDocument {
            arxiv_id: "1".into(),
            title: String::new(),
            authors: String::new(),
            abstract_text: String::new(),
            categories: vec![],
            pdf_url: String::new(),
            published_date: String::new(),
            raw_text: "héllo wörld".into(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        doc.truncate_raw_text(5);
        assert_eq!(doc.raw_text, "héllo");
        doc.truncate_raw_text(50);
        assert_eq!(doc.raw_text, "héllo");
    }

    #[test]
    fn test_parse_search_response() {
        let body = json!({
            "hits": {
                "total": { "value": 42, "relation": "eq" },
                "hits": [
                    {
                        "_id": "2401.00001",
                        "_score": 7.5,
                        "_source": {
                            "arxiv_id": "2401.00001",
                            "title": "Deep Agents",
                            "authors": "A. Author",
                            "abstract": "Agents, deeply.",
                            "categories": ["cs.AI"],
                            "published_date": "2024-01-01T00:00:00Z",
                            "pdf_url": "https://arxiv.org/pdf/2401.00001"
                        },
                        "highlight": { "title": ["<em>Deep</em> Agents"] }
                    },
                    {
                        "_id": "2401.00002",
                        "_score": null,
                        "_source": { "arxiv_id": "2401.00002", "title": "Sorted by date" }
                    }
                ]
            }
        });

        let results = parse_search_response(body).unwrap();
        assert_eq!(results.total, 42);
        assert_eq!(results.hits.len(), 2);
        assert_eq!(results.hits[0].score, 7.5);
        assert_eq!(results.hits[0].abstract_text.as_deref(), Some("Agents, deeply."));
        assert!(results.hits[0].highlights.is_some());
        assert_eq!(results.hits[1].score, 0.0);
        assert!(results.hits[1].authors.is_none());
        assert!(results.hits[1].highlights.is_none());
        assert!(results.error.is_none());
    }

    #[test]
    fn test_parse_rejects_malformed_response() {
        assert!(parse_search_response(json!({ "took": 3 })).is_err());
    }

    #[tokio::test]
    async fn test_health_check_false_when_unreachable() {
        let settings = OpenSearchSettings {
            host: "http://127.0.0.1:1".into(),
            ..Default::default()
        };
        let client = OpenSearchClient::new(&settings).unwrap();
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_search_unreachable_yields_error_results() {
        let settings = OpenSearchSettings {
            host: "http://127.0.0.1:1".into(),
            ..Default::default()
        };
        let client = OpenSearchClient::new(&settings).unwrap();

        let results = client.search_papers(&PaperQueryBuilder::new("agents")).await.unwrap();
        assert_eq!(results.total, 0);
        assert!(results.hits.is_empty());
        assert!(results.error.is_some());
    }
}
