//! arXiv export API client
//!
//! Builds category/date queries against the Atom export API and fetches the
//! raw feeds, keeping the configured delay between consecutive requests.

use crate::config::ArxivSettings;
use crate::errors::{AppError, Result};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Client for the arXiv export API
#[derive(Debug)]
pub struct ArxivClient {
    http: reqwest::Client,
    settings: ArxivSettings,
    /// When the last request was sent; held across the wait so requests queue
    last_request: Mutex<Option<Instant>>,
}

impl ArxivClient {
    /// Build the client and make sure the PDF cache directory exists
    pub fn new(settings: &ArxivSettings) -> Result<Self> {
        Url::parse(&settings.base_url).map_err(|e| AppError::InvalidFormat {
            message: format!("Invalid arXiv base URL '{}': {}", settings.base_url, e),
        })?;

        std::fs::create_dir_all(&settings.pdf_cache_dir)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .user_agent(concat!("paper-curator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(
            base_url = %settings.base_url,
            category = %settings.search_category,
            cache_dir = %settings.pdf_cache_dir.display(),
            "arXiv client initialized"
        );

        Ok(Self {
            http,
            settings: settings.clone(),
            last_request: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    /// Default number of results per query
    pub fn max_results(&self) -> u32 {
        self.settings.max_results
    }

    pub fn search_category(&self) -> &str {
        &self.settings.search_category
    }

    pub fn pdf_cache_dir(&self) -> &Path {
        &self.settings.pdf_cache_dir
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.settings.rate_limit_delay.max(0.0))
    }

    /// Build a query URL for the configured category
    ///
    /// Dates are `YYYYMMDD` and inclusive; a missing bound is left open.
    pub fn search_url(
        &self,
        from_date: Option<&str>,
        to_date: Option<&str>,
        max_results: Option<u32>,
        start: u32,
    ) -> Result<Url> {
        let mut search_query = format!("cat:{}", self.settings.search_category);

        if from_date.is_some() || to_date.is_some() {
            let lower = match from_date {
                Some(date) => format!("{}0000", validate_date(date)?),
                None => "*".to_string(),
            };
            let upper = match to_date {
                Some(date) => format!("{}2359", validate_date(date)?),
                None => "*".to_string(),
            };
            search_query.push_str(&format!(" AND submittedDate:[{} TO {}]", lower, upper));
        }

        let mut url = Url::parse(&self.settings.base_url).map_err(|e| AppError::InvalidFormat {
            message: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("search_query", &search_query)
            .append_pair("start", &start.to_string())
            .append_pair("max_results", &max_results.unwrap_or(self.settings.max_results).to_string())
            .append_pair("sortBy", "submittedDate")
            .append_pair("sortOrder", "descending");

        Ok(url)
    }

    /// Where the PDF for `arxiv_id` is cached locally
    pub fn pdf_cache_path(&self, arxiv_id: &str) -> PathBuf {
        // Old-style identifiers contain a slash (e.g. cs/0112017)
        let file_name = format!("{}.pdf", arxiv_id.replace('/', "_"));
        self.settings.pdf_cache_dir.join(file_name)
    }

    /// Fetch a raw Atom feed
    pub async fn fetch_feed(&self, url: Url) -> Result<String> {
        self.wait_for_rate_limit().await;

        debug!(%url, "Fetching arXiv feed");
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let delay = self.rate_limit_delay();
            let elapsed = previous.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Build the arXiv client described by the settings
pub fn make_arxiv_client(settings: &crate::config::Settings) -> Result<ArxivClient> {
    ArxivClient::new(&settings.arxiv)
}

fn validate_date(date: &str) -> Result<&str> {
    if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
        Ok(date)
    } else {
        Err(AppError::Validation {
            message: format!("Expected a YYYYMMDD date, got '{}'", date),
            field: Some("date".to_string()),
        })
    }
}
