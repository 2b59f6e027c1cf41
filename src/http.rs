//! HTTP client shared by every page and asset request of a run.

use std::time::Duration;

use url::Url;

use crate::config::{DownloadConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;

/// A `reqwest` client with status checking and retry applied to every GET.
///
/// Page fetches are bounded by the configured timeout as a whole. Asset
/// transfers only bound each read, so long files can stream for as long as
/// data keeps arriving.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retry: RetryConfig,
    timeout: Duration,
}

impl HttpClient {
    /// Builds a client from the download configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            retry: config.retry.clone(),
            timeout: config.timeout,
        })
    }

    /// Fetches a page and returns its decoded body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] once retries are exhausted or on a permanent failure.
    pub async fn get_text(&self, url: &Url) -> Result<String> {
        with_retry(&self.retry, url.as_str(), move || async move {
            let response = self.send(url, Some(self.timeout)).await?;
            response
                .text()
                .await
                .map_err(|e| Error::fetch(url.as_str(), e))
        })
        .await
    }

    /// Sends a GET request and returns the response once the headers arrived.
    ///
    /// The body is left unread so callers can decide whether they need it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] once retries are exhausted or on a permanent failure.
    pub async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        with_retry(&self.retry, url.as_str(), move || self.send(url, None)).await
    }

    async fn send(&self, url: &Url, timeout: Option<Duration>) -> Result<reqwest::Response> {
        log::debug!("GET {url}");
        let mut request = self.client.get(url.clone());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::fetch(url.as_str(), e))
    }
}
