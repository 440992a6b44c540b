use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::domain::{
    cache::EndpointCache,
    chain::ChainClient,
    config::normalize_endpoint,
    content::{ContentId, StorageProviderId},
};

#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("Resolution cancelled")]
    Cancelled,
    #[error("Resolving failed")]
    ResolvingFailed,
    #[error("Resolved endpoint is not a valid URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// Reasons a single bootstrap node could not answer; all of them mean "try the next node"
#[derive(Debug, Error)]
enum BootstrapError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("malformed service info: {0}")]
    Body(#[from] serde_json::Error),
    #[error("service info has an invalid asset endpoint: {0}")]
    Endpoint(url::ParseError),
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    serialized: String,
}

#[derive(Debug, Deserialize)]
struct ServiceInfo {
    asset: AssetService,
}

#[derive(Debug, Deserialize)]
struct AssetService {
    endpoint: String,
}

/// Turns storage provider ids into asset API URLs via bootstrap discovery nodes
pub struct DiscoveryProvider {
    client: Client,
    chain: Arc<dyn ChainClient>,
    cache: EndpointCache,
}

impl DiscoveryProvider {
    pub fn new(client: Client, chain: Arc<dyn ChainClient>, cache: EndpointCache) -> Self {
        Self {
            client,
            chain,
            cache,
        }
    }

    pub fn cache(&self) -> &EndpointCache {
        &self.cache
    }

    /// Resolve `{endpoint}/asset/v0/{content_id}` for a provider.
    ///
    /// A fresh cache record skips the network. Otherwise bootstrap nodes are
    /// asked in order until one answers. If none answers but an older record
    /// exists, that record is still used.
    pub async fn resolve_asset_endpoint(
        &self,
        provider: StorageProviderId,
        content_id: Option<&ContentId>,
        cancel: &CancellationToken,
    ) -> Result<Url, DiscoveryError> {
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }

        if self.cache.fresh(provider).is_some() {
            tracing::debug!("Using cached endpoint for storage provider {}", provider);
        } else {
            self.resolve_from_bootstrap(provider, cancel).await?;
        }

        let record = self.cache.get(provider).ok_or_else(|| {
            tracing::warn!("Could not resolve endpoint for storage provider {}", provider);
            DiscoveryError::ResolvingFailed
        })?;

        let url = match content_id {
            Some(id) => format!("{}/asset/v0/{}", record.asset_api_endpoint, id),
            None => format!("{}/asset/v0", record.asset_api_endpoint),
        };

        Ok(Url::parse(&url)?)
    }

    /// Count a failed transfer against the provider's cached record, if it has one
    pub fn report_unreachable(&self, provider: StorageProviderId) {
        if self.cache.report_unreachable(provider) {
            let reports = self
                .cache
                .get(provider)
                .map(|record| record.unreachable_reports)
                .unwrap_or_default();
            tracing::warn!(
                "Storage provider {} reported unreachable ({} reports)",
                provider,
                reports
            );
        } else {
            tracing::debug!(
                "Ignoring unreachable report for unresolved storage provider {}",
                provider
            );
        }
    }

    async fn resolve_from_bootstrap(
        &self,
        provider: StorageProviderId,
        cancel: &CancellationToken,
    ) -> Result<(), DiscoveryError> {
        let nodes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
            result = self.chain.bootstrap_endpoints() => match result {
                Ok(nodes) => nodes,
                Err(e) => {
                    tracing::warn!("Failed to load bootstrap endpoints: {}", e);
                    Vec::new()
                }
            },
        };

        for node in &nodes {
            let base = match Url::parse(node) {
                Ok(base) => base,
                Err(e) => {
                    tracing::debug!("Skipping bootstrap node '{}': {}", node, e);
                    continue;
                }
            };

            let discover_url = format!(
                "{}/discover/v0/{}",
                normalize_endpoint(base.as_str()),
                provider
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
                outcome = self.query_node(&discover_url) => outcome,
            };

            match outcome {
                Ok(endpoint) => {
                    tracing::info!(
                        "Resolved storage provider {} to {} via {}",
                        provider,
                        endpoint,
                        node
                    );
                    self.cache.store_resolved(provider, endpoint);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Bootstrap node {} failed for provider {}: {}", node, provider, e);
                }
            }
        }

        Ok(())
    }

    async fn query_node(&self, discover_url: &str) -> Result<String, BootstrapError> {
        let response = self.client.get(discover_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::Status(status));
        }

        let body = response.text().await?;
        let envelope: DiscoveryResponse = serde_json::from_str(&body)?;
        let info: ServiceInfo = serde_json::from_str(&envelope.serialized)?;

        let endpoint = normalize_endpoint(&info.asset.endpoint);
        Url::parse(&endpoint).map_err(BootstrapError::Endpoint)?;

        Ok(endpoint)
    }
}
