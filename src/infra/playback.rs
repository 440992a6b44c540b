use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::domain::{
    chain::ChainError,
    content::{ContentId, MediaKind, StorageProviderId},
};
use crate::infra::{
    asset_client::{AssetClient, TransferError},
    discovery::{DiscoveryError, DiscoveryProvider},
    provider_set::ProviderSetResolver,
};

#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("No storage providers found")]
    NoProviders,
    #[error("Unable to reach any storage provider")]
    Exhausted,
    #[error("Failed to load storage providers: {0}")]
    Chain(#[from] ChainError),
    #[error("Resolution cancelled")]
    Cancelled,
}

/// A provider that answered the existence probe for the content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAsset {
    pub provider: StorageProviderId,
    pub url: Url,
    pub content_type: String,
}

impl ResolvedAsset {
    pub fn download_url(&self) -> Url {
        let mut url = self.url.clone();
        url.set_query(Some("download"));
        url
    }

    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_content_type(&self.content_type)
    }
}

#[derive(Debug, Clone)]
pub enum ResolutionState {
    Idle,
    Resolving,
    Resolved(ResolvedAsset),
    Failed(ResolutionError),
}

struct Session {
    state: ResolutionState,
    cancel: CancellationToken,
    attempt: u64,
}

/// Finds a reachable provider for one content object.
///
/// `start` moves `Idle`/`Failed` to `Resolving` and runs the probe loop.
/// `stop` tears the session down: the running attempt is cancelled without
/// reporting anyone unreachable and the state returns to `Idle`.
pub struct AssetResolver {
    content_id: ContentId,
    discovery: Arc<DiscoveryProvider>,
    providers: ProviderSetResolver,
    assets: AssetClient,
    session: Mutex<Session>,
}

impl AssetResolver {
    pub fn new(
        content_id: ContentId,
        discovery: Arc<DiscoveryProvider>,
        providers: ProviderSetResolver,
        assets: AssetClient,
    ) -> Self {
        Self {
            content_id,
            discovery,
            providers,
            assets,
            session: Mutex::new(Session {
                state: ResolutionState::Idle,
                cancel: CancellationToken::new(),
                attempt: 0,
            }),
        }
    }

    pub fn state(&self) -> ResolutionState {
        self.session.lock().state.clone()
    }

    /// Run a resolution attempt, or return the current state if one is
    /// already running or has succeeded.
    pub async fn start(&self) -> ResolutionState {
        let (cancel, attempt) = {
            let mut session = self.session.lock();
            if matches!(
                session.state,
                ResolutionState::Resolving | ResolutionState::Resolved(_)
            ) {
                return session.state.clone();
            }
            session.state = ResolutionState::Resolving;
            (session.cancel.clone(), session.attempt)
        };

        tracing::info!("Resolving content {}", self.content_id);
        let outcome = self.resolve(&cancel).await;

        let mut session = self.session.lock();
        if session.attempt != attempt {
            // Stopped while running; the session has moved on
            return session.state.clone();
        }

        session.state = match outcome {
            Ok(asset) => {
                tracing::info!(
                    "Content {} resolved to provider {} at {}",
                    self.content_id,
                    asset.provider,
                    asset.url
                );
                ResolutionState::Resolved(asset)
            }
            Err(ResolutionError::Cancelled) => ResolutionState::Idle,
            Err(e) => {
                tracing::warn!("Failed to resolve content {}: {}", self.content_id, e);
                ResolutionState::Failed(e)
            }
        };
        session.state.clone()
    }

    pub fn stop(&self) {
        let mut session = self.session.lock();
        session.cancel.cancel();
        session.cancel = CancellationToken::new();
        session.attempt += 1;
        session.state = ResolutionState::Idle;
    }

    async fn resolve(&self, cancel: &CancellationToken) -> Result<ResolvedAsset, ResolutionError> {
        let candidates = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolutionError::Cancelled),
            result = self.providers.resolve(&self.content_id) => result?,
        };

        if candidates.is_empty() {
            return Err(ResolutionError::NoProviders);
        }

        self.probe_candidates(candidates, cancel).await
    }

    /// Try candidates strictly one after another until one answers the probe
    pub async fn probe_candidates(
        &self,
        candidates: Vec<StorageProviderId>,
        cancel: &CancellationToken,
    ) -> Result<ResolvedAsset, ResolutionError> {
        for provider in candidates {
            if cancel.is_cancelled() {
                return Err(ResolutionError::Cancelled);
            }

            let url = match self
                .discovery
                .resolve_asset_endpoint(provider, Some(&self.content_id), cancel)
                .await
            {
                Ok(url) => url,
                Err(DiscoveryError::Cancelled) => return Err(ResolutionError::Cancelled),
                Err(e) => {
                    tracing::debug!("Skipping storage provider {}: {}", provider, e);
                    continue;
                }
            };

            match self.assets.probe(&url, cancel).await {
                Ok(outcome) => {
                    return Ok(ResolvedAsset {
                        provider,
                        url,
                        content_type: outcome.content_type,
                    });
                }
                Err(TransferError::Cancelled) => return Err(ResolutionError::Cancelled),
                Err(e) => {
                    tracing::debug!("Probe of {} failed: {}", url, e);
                    if e.is_unreachable() {
                        self.discovery.report_unreachable(provider);
                    }
                }
            }
        }

        Err(ResolutionError::Exhausted)
    }
}
