//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub arxiv_id: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Author names as a JSON array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub authors: Json,

    #[sea_orm(column_name = "abstract", column_type = "Text")]
    pub abstract_text: String,

    /// arXiv category codes as a JSON array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub categories: Json,

    pub published_date: DateTimeWithTimeZone,

    #[sea_orm(column_type = "Text")]
    pub pdf_url: String,

    /// Full text extracted from the PDF, when it has been parsed
    #[sea_orm(column_type = "Text", nullable)]
    pub raw_text: Option<String>,

    pub pdf_processed: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Author names, ignoring malformed entries
    pub fn author_names(&self) -> Vec<String> {
        string_list(&self.authors)
    }

    /// Category codes, ignoring malformed entries
    pub fn category_codes(&self) -> Vec<String> {
        string_list(&self.categories)
    }
}

fn string_list(value: &Json) -> Vec<String> {
    match value {
        Json::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Json::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_list() {
        assert_eq!(string_list(&json!(["A. Turing", 3, "G. Hopper"])), vec!["A. Turing", "G. Hopper"]);
        assert_eq!(string_list(&json!("cs.AI")), vec!["cs.AI"]);
        assert!(string_list(&json!(null)).is_empty());
    }
}
