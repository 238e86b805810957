use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::Settings;
use crate::parser::document::Document;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned HTTP {status}")]
    Status { status: StatusCode, url: String },
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Retrieves pages for the extractors. Returns a `Document` or an error,
/// never an empty document standing in for a failure.
pub struct Fetcher {
    client: Client,
    base: Url,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let base = Url::parse(&settings.base_url)?;
        Ok(Fetcher { client, base })
    }

    /// `{base}/search?search=<query>`, query form-encoded.
    pub fn search_url(&self, query: &str) -> Result<Url, FetchError> {
        let mut url = self.base.join("/search")?;
        url.query_pairs_mut().append_pair("search", query.trim());
        Ok(url)
    }

    pub async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let url = Url::parse(url)?;
        let pb = spinner(&format!("Fetching {}", url));

        let result = self.get(&url).await;
        pb.finish_and_clear();

        let body = result?;
        info!("Fetched {} ({} bytes)", url, body.len());
        Ok(Document::parse(body))
    }

    async fn get(&self, url: &Url) -> Result<String, FetchError> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        debug!("{} -> {}", url, status);
        if !status.is_success() {
            return Err(FetchError::Status { status, url: url.to_string() });
        }
        Ok(resp.text().await?)
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
