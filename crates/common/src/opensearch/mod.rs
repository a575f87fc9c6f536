//! OpenSearch integration
//!
//! Provides:
//! - The papers index mapping
//! - A query builder for BM25 paper search
//! - A REST client for index management, indexing and search

mod client;
pub mod index;
pub mod query;

pub use client::{
    BulkIndexSummary, IndexStats, OpenSearchClient, PaperDocument, PaperHit, SearchResults,
};
pub use query::PaperQueryBuilder;

use crate::config::Settings;
use crate::errors::Result;

/// Build the OpenSearch client described by the settings
pub fn make_opensearch_client(settings: &Settings) -> Result<OpenSearchClient> {
    OpenSearchClient::new(&settings.opensearch)
}
