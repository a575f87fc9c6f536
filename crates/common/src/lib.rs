//! Paper Curator Common Library
//!
//! Shared code for the Paper Curator API and indexer including:
//! - Settings loading and the process-wide settings singleton
//! - Database handle, scoped sessions and the paper repository
//! - OpenSearch client, index mapping and query builder
//! - arXiv API client
//! - PDF parser service
//! - Error types and metrics helpers

pub mod arxiv;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod opensearch;
pub mod pdf;

// Re-export commonly used types
pub use arxiv::ArxivClient;
pub use crate::config::{get_settings, Settings};
pub use db::{Database, DbSession};
pub use errors::{AppError, Result};
pub use opensearch::OpenSearchClient;
pub use pdf::PdfParserService;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
