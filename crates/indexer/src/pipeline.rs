//! Indexing pipeline
//!
//! 1. Verify the database and the search cluster
//! 2. Read the papers stored since a cut-off through a scoped session
//! 3. Index each one into OpenSearch
//! 4. Report counts

use chrono::{DateTime, Utc};
use paper_curator_common::{
    db::{models::Paper, PaperRepository},
    metrics,
    opensearch::PaperDocument,
    Database, OpenSearchClient,
};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::errors::IndexerError;

/// Outcome of the environment checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub database: bool,
    pub opensearch: bool,
    /// The index was created (or recreated) during setup
    pub index_created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStatus {
    Success,
    Partial,
    Failed,
}

/// Summary of one indexing run
#[derive(Debug, Clone, Serialize)]
pub struct IndexingReport {
    pub status: IndexingStatus,
    pub since: DateTime<Utc>,
    pub papers_found: usize,
    pub papers_indexed: usize,
    pub papers_failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_documents: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IndexingReport {
    fn failed(since: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            status: IndexingStatus::Failed,
            since,
            papers_found: 0,
            papers_indexed: 0,
            papers_failed: 0,
            total_documents: None,
            message: Some(message.into()),
        }
    }
}

pub struct Indexer {
    database: Database,
    opensearch: Arc<OpenSearchClient>,
}

impl Indexer {
    pub fn new(database: Database, opensearch: Arc<OpenSearchClient>) -> Self {
        Self { database, opensearch }
    }

    /// Check both backends and make sure the index exists
    pub async fn setup_environment(&self, force_recreate: bool) -> Result<SetupReport, IndexerError> {
        let mut report = SetupReport::default();

        self.database
            .with_session(|session| {
                Box::pin(async move {
                    session.execute_unprepared("SELECT 1").await?;
                    Ok(())
                })
            })
            .await
            .map_err(|e| IndexerError::DatabaseUnavailable(e.to_string()))?;
        report.database = true;
        info!("Database connection verified");

        if !self.opensearch.health_check().await {
            warn!(host = self.opensearch.host(), "OpenSearch is not healthy");
            return Ok(report);
        }
        report.opensearch = true;

        report.index_created = self
            .opensearch
            .create_index(force_recreate)
            .await
            .map_err(|e| IndexerError::IndexSetup(e.to_string()))?;
        info!(
            index = self.opensearch.index_name(),
            created = report.index_created,
            "Search index ready"
        );

        Ok(report)
    }

    /// Index papers stored since `since`, at most `limit` of them
    pub async fn index_recent_papers(&self, since: DateTime<Utc>, limit: u64) -> IndexingReport {
        if !self.opensearch.health_check().await {
            error!("OpenSearch is not healthy, skipping indexing");
            return IndexingReport::failed(since, IndexerError::SearchUnavailable.to_string());
        }

        let papers = match self.load_papers(since, limit).await {
            Ok(papers) => papers,
            Err(e) => {
                error!(error = %e, "Failed to read papers");
                return IndexingReport::failed(since, e.to_string());
            }
        };

        info!(count = papers.len(), %since, "Papers to index");

        let documents = documents_from(&papers);
        let summary = self.opensearch.bulk_index_papers(&documents).await;
        metrics::record_indexing(summary.success, summary.failed);

        let total_documents = match self.opensearch.get_index_stats().await {
            Ok(stats) => Some(stats.document_count),
            Err(e) => {
                warn!(error = %e, "Failed to read index stats");
                None
            }
        };

        IndexingReport {
            status: status_for(summary.success, summary.failed),
            since,
            papers_found: papers.len(),
            papers_indexed: summary.success,
            papers_failed: summary.failed,
            total_documents,
            message: None,
        }
    }

    async fn load_papers(&self, since: DateTime<Utc>, limit: u64) -> Result<Vec<Paper>, IndexerError> {
        let papers = self
            .database
            .with_session(|session| {
                Box::pin(async move {
                    PaperRepository::new(session.conn())
                        .created_since(since, limit)
                        .await
                })
            })
            .await?;
        Ok(papers)
    }
}

/// Search documents for the given papers
pub fn documents_from(papers: &[Paper]) -> Vec<PaperDocument> {
    papers.iter().map(PaperDocument::from).collect()
}

fn status_for(indexed: usize, failed: usize) -> IndexingStatus {
    match (indexed, failed) {
        (_, 0) => IndexingStatus::Success,
        (0, _) => IndexingStatus::Failed,
        _ => IndexingStatus::Partial,
    }
}

/// Log the report the way operators read it
pub fn log_report(setup: &SetupReport, report: &IndexingReport) {
    info!(
        database = setup.database,
        opensearch = setup.opensearch,
        index_created = setup.index_created,
        "Environment"
    );

    match serde_json::to_string(report) {
        Ok(json) => info!(report = %json, "Indexing report"),
        Err(e) => warn!(error = %e, "Could not serialize indexing report"),
    }

    if report.status == IndexingStatus::Failed {
        error!(message = ?report.message, "Indexing failed");
    } else {
        info!(
            found = report.papers_found,
            indexed = report.papers_indexed,
            failed = report.papers_failed,
            total_documents = ?report.total_documents,
            "Indexing finished"
        );
    }
}
