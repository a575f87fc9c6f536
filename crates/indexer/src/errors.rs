//! Indexer error types

use paper_curator_common::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Database check failed: {0}")]
    DatabaseUnavailable(String),

    #[error("OpenSearch is not healthy")]
    SearchUnavailable,

    #[error("Index setup failed: {0}")]
    IndexSetup(String),

    #[error(transparent)]
    Common(#[from] AppError),
}
