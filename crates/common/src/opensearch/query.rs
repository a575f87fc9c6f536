//! Search request bodies for the papers index

use serde_json::{json, Map, Value};

/// Fields searched when none are given: title weighs most, then abstract
const DEFAULT_FIELDS: &[&str] = &["title^3", "abstract^2", "authors^1"];

/// Fields returned with every hit
const SOURCE_FIELDS: &[&str] = &[
    "arxiv_id",
    "title",
    "authors",
    "abstract",
    "categories",
    "published_date",
    "pdf_url",
];

/// Builds OpenSearch query bodies for paper search
#[derive(Debug, Clone)]
pub struct PaperQueryBuilder {
    query: String,
    size: usize,
    from: usize,
    fields: Vec<String>,
    categories: Option<Vec<String>>,
    track_total_hits: bool,
    latest_papers: bool,
}

impl PaperQueryBuilder {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            size: 10,
            from: 0,
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            categories: None,
            track_total_hits: true,
            latest_papers: false,
        }
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Offset of the first hit, for pagination
    pub fn offset(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    /// Replace the boosted default fields
    pub fn fields(mut self, fields: Vec<String>) -> Self {
        if !fields.is_empty() {
            self.fields = fields;
        }
        self
    }

    /// Restrict hits to any of the given categories
    pub fn categories(mut self, categories: Option<Vec<String>>) -> Self {
        self.categories = categories.filter(|c| !c.is_empty());
        self
    }

    pub fn track_total_hits(mut self, track: bool) -> Self {
        self.track_total_hits = track;
        self
    }

    /// Order by publication date instead of relevance
    pub fn latest_papers(mut self, latest: bool) -> Self {
        self.latest_papers = latest;
        self
    }

    /// Build the complete request body
    pub fn build(&self) -> Value {
        let mut body = json!({
            "query": self.build_query(),
            "size": self.size,
            "from": self.from,
            "track_total_hits": self.track_total_hits,
            "_source": SOURCE_FIELDS,
            "highlight": Self::build_highlight(),
        });

        if let Some(sort) = self.build_sort() {
            body["sort"] = sort;
        }

        body
    }

    fn has_text(&self) -> bool {
        !self.query.trim().is_empty()
    }

    fn build_query(&self) -> Value {
        let mut bool_query = Map::new();

        let must = if self.has_text() {
            json!([self.build_text_query()])
        } else {
            json!([{ "match_all": {} }])
        };
        bool_query.insert("must".to_string(), must);

        if let Some(categories) = &self.categories {
            bool_query.insert(
                "filter".to_string(),
                json!([{ "terms": { "categories": categories } }]),
            );
        }

        json!({ "bool": bool_query })
    }

    fn build_text_query(&self) -> Value {
        json!({
            "multi_match": {
                "query": self.query,
                "fields": self.fields,
                "type": "best_fields",
                "operator": "or",
                "fuzziness": "AUTO",
                "prefix_length": 2
            }
        })
    }

    fn build_highlight() -> Value {
        json!({
            "fields": {
                "title": {
                    "fragment_size": 0,
                    "number_of_fragments": 0
                },
                "abstract": {
                    "fragment_size": 150,
                    "number_of_fragments": 3,
                    "pre_tags": ["<mark>"],
                    "post_tags": ["</mark>"]
                },
                "authors": {
                    "fragment_size": 0,
                    "number_of_fragments": 0,
                    "pre_tags": ["<mark>"],
                    "post_tags": ["</mark>"]
                }
            },
            "require_field_match": false
        })
    }

    /// Relevance order needs no sort clause; date order is used when asked
    /// for and whenever there is no text to score against.
    fn build_sort(&self) -> Option<Value> {
        if self.latest_papers || !self.has_text() {
            Some(json!([{ "published_date": { "order": "desc" } }, "_score"]))
        } else {
            None
        }
    }
}
