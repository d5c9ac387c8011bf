//! SMN alert feed client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use smn_alerts_core::AlertRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed returned non-success status: {0}")]
    Status(StatusCode),
    #[error("feed payload is not an alert list: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait FeedClient: Send + Sync {
    /// One attempt at the feed. Callers decide what a failure means.
    async fn fetch(&self) -> Result<Vec<AlertRecord>, FeedError>;
}

#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    client: Client,
    url: String,
}

impl HttpFeedClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch(&self) -> Result<Vec<AlertRecord>, FeedError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }
        let body = response.bytes().await?;
        parse_alerts(&body)
    }
}

pub fn parse_alerts(body: &[u8]) -> Result<Vec<AlertRecord>, FeedError> {
    Ok(serde_json::from_slice(body)?)
}
