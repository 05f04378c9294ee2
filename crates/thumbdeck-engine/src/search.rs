use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use thumbdeck_contracts::candidates::{candidates_from_search_payload, VideoCandidate};

use crate::http::{response_bytes_or_error, response_json_or_error, trimmed_base_url};

pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)";

const SCRAPECREATORS_DEFAULT_BASE: &str = "https://api.scrapecreators.com";

pub trait VideoSearch {
    fn name(&self) -> &str;
    /// Videos in the order the endpoint returned them.
    fn search(&self, query: &str) -> Result<Vec<VideoCandidate>>;
}

pub trait ThumbnailFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct ScrapeCreatorsSearch {
    api_base: String,
    api_key: String,
    http: HttpClient,
}

impl ScrapeCreatorsSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: trimmed_base_url(
                env::var("SCRAPECREATORS_API_BASE").ok(),
                SCRAPECREATORS_DEFAULT_BASE,
            ),
            api_key: api_key.into(),
            http: HttpClient::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/youtube/search", self.api_base)
    }

    /// Full request URL; the query is percent-encoded (spaces become `%20`).
    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}?query={}&includeExtras=true",
            self.endpoint(),
            urlencoding::encode(query)
        )
    }
}

impl VideoSearch for ScrapeCreatorsSearch {
    fn name(&self) -> &str {
        "scrapecreators"
    }

    fn search(&self, query: &str) -> Result<Vec<VideoCandidate>> {
        let endpoint = self.search_url(query);
        let response = self
            .http
            .get(&endpoint)
            .header("x-api-key", &self.api_key)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .with_context(|| format!("search request failed ({endpoint})"))?;
        let payload = response_json_or_error("ScrapeCreators search", response)?;
        Ok(candidates_from_search_payload(&payload))
    }
}

pub struct HttpThumbnailFetcher {
    http: HttpClient,
}

impl HttpThumbnailFetcher {
    pub fn new() -> Self {
        Self {
            http: HttpClient::new(),
        }
    }
}

impl Default for HttpThumbnailFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailFetcher for HttpThumbnailFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .send()
            .with_context(|| format!("thumbnail request failed ({url})"))?;
        response_bytes_or_error("thumbnail host", response)
    }
}
