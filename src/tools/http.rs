use crate::di::RemoteFetcher;
use async_trait::async_trait;
use bundlesmith_core::{BundleError, BundleResult};
use reqwest::Client;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetches documents over HTTP(S), or from disk for `file://` URLs
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> BundleResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("bundlesmith/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> BundleResult<Vec<u8>> {
        tracing::debug!(url, "fetching");
        let result = match url.strip_prefix("file://") {
            Some(path) => tokio::fs::read(path).await.map_err(|e| e.to_string()),
            None => self.fetch_http(url).await,
        };
        result.map_err(|reason| BundleError::Fetch {
            url: url.to_string(),
            reason,
        })
    }
}
