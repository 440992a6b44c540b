use bytes::Bytes;
use reqwest::{header, Body, Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::domain::content::DEFAULT_CONTENT_TYPE;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Request cancelled")]
    Cancelled,
    #[error("Asset server responded with status {0}")]
    Status(StatusCode),
    #[error("Asset server unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Failed to read upload source: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// True when the failure points at the provider itself: no response at all, or 500-504.
    /// Request construction and local body stream failures are ours, not the provider's.
    pub fn is_unreachable(&self) -> bool {
        match self {
            TransferError::Network(e) => !(e.is_builder() || e.is_body()),
            TransferError::Status(status) => (500..=504).contains(&status.as_u16()),
            TransferError::Cancelled | TransferError::Io(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub content_type: String,
}

/// Build the HTTP client shared by discovery and asset transfers
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("asset-discovery/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Client for the storage provider asset API
#[derive(Debug, Clone)]
pub struct AssetClient {
    client: Client,
}

impl AssetClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Check that the asset exists and learn its content type
    pub async fn probe(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome, TransferError> {
        tracing::debug!("Probing asset at {}", url);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            result = self.client.head(url.clone()).send() => result?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status(status));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        Ok(ProbeOutcome { content_type })
    }

    /// Stream a file to the asset endpoint with PUT.
    /// `on_progress` receives the running byte count as chunks are handed to the body.
    pub async fn put_file<F>(
        &self,
        url: &Url,
        path: &Path,
        total: u64,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError>
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let file = tokio::fs::File::open(path).await?;

        let mut loaded: u64 = 0;
        let stream = ReaderStream::new(file).map(move |chunk: Result<Bytes, std::io::Error>| {
            if let Ok(bytes) = &chunk {
                loaded += bytes.len() as u64;
                on_progress(loaded);
            }
            chunk
        });

        let request = self
            .client
            .put(url.clone())
            .header(header::CONTENT_LENGTH, total)
            .body(Body::wrap_stream(stream));

        tracing::info!("Uploading {} bytes to {}", total, url);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            result = request.send() => result?,
        };

        let status = response.status();
        if !status.is_success() {
            tracing::error!("Upload to {} failed with status {}", url, status);
            return Err(TransferError::Status(status));
        }

        Ok(())
    }
}
