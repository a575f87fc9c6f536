//! Repository pattern for paper queries
//!
//! The repository borrows whatever connection it is given, so the same
//! queries run on the pool or inside a request's [`DbSession`](super::DbSession).

use crate::db::models::*;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

/// Read access to the `papers` table
pub struct PaperRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> PaperRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Find a paper by its arXiv identifier
    pub async fn find_by_arxiv_id(&self, arxiv_id: &str) -> Result<Option<Paper>> {
        PaperEntity::find()
            .filter(PaperColumn::ArxivId.eq(arxiv_id))
            .one(self.conn)
            .await
            .map_err(Into::into)
    }

    /// List papers, newest publication first
    pub async fn list(&self, limit: u64, offset: u64) -> Result<Vec<Paper>> {
        PaperEntity::find()
            .order_by_desc(PaperColumn::PublishedDate)
            .limit(limit)
            .offset(offset)
            .all(self.conn)
            .await
            .map_err(Into::into)
    }

    /// Papers stored at or after `since`, most recently stored first
    pub async fn created_since(&self, since: DateTime<Utc>, limit: u64) -> Result<Vec<Paper>> {
        PaperEntity::find()
            .filter(PaperColumn::CreatedAt.gte(since))
            .order_by_desc(PaperColumn::CreatedAt)
            .limit(limit)
            .all(self.conn)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;
    use uuid::Uuid;

    pub(crate) fn sample_paper(arxiv_id: &str) -> Paper {
        let published = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        Paper {
            id: Uuid::new_v4(),
            arxiv_id: arxiv_id.to_string(),
            title: "Attention Is Still All You Need".to_string(),
            authors: json!(["Ada Lovelace", "Alan Turing"]),
            abstract_text: "We revisit attention.".to_string(),
            categories: json!(["cs.AI", "cs.LG"]),
            published_date: published.into(),
            pdf_url: format!("https://arxiv.org/pdf/{}", arxiv_id),
            raw_text: None,
            pdf_processed: false,
            created_at: published.into(),
            updated_at: published.into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_arxiv_id() {
        let paper = sample_paper("2401.00001");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![paper.clone()]])
            .into_connection();

        let found = PaperRepository::new(&db).find_by_arxiv_id("2401.00001").await.unwrap();
        assert_eq!(found, Some(paper));
    }

    #[tokio::test]
    async fn test_find_missing_paper() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Paper>::new()])
            .into_connection();

        let found = PaperRepository::new(&db).find_by_arxiv_id("0000.00000").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_list_returns_rows_in_order() {
        let rows = vec![sample_paper("2401.00002"), sample_paper("2401.00001")];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows.clone()])
            .into_connection();

        let listed = PaperRepository::new(&db).list(10, 0).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.arxiv_id.as_str()).collect();
        assert_eq!(ids, vec!["2401.00002", "2401.00001"]);
    }
}
