//! Application state shared across handlers

use axum::extract::FromRef;
use paper_curator_common::{ArxivClient, Database, OpenSearchClient, PdfParserService, Settings};
use std::sync::Arc;

/// Singletons built once at startup
///
/// Cloning copies the handles only; every clone points at the same settings,
/// pool and clients. Each field can be pulled out on its own through
/// [`FromRef`], which is what the extractors in [`crate::dependencies`] use.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub database: Database,
    pub opensearch: Arc<OpenSearchClient>,
    pub arxiv: Arc<ArxivClient>,
    pub pdf_parser: Arc<PdfParserService>,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        database: Database,
        opensearch: OpenSearchClient,
        arxiv: ArxivClient,
        pdf_parser: PdfParserService,
    ) -> Self {
        Self {
            settings,
            database,
            opensearch: Arc::new(opensearch),
            arxiv: Arc::new(arxiv),
            pdf_parser: Arc::new(pdf_parser),
        }
    }
}
