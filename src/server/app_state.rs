use crate::domain::{
  cache::EndpointCache,
  chain::ChainClient,
  clock::SystemClock,
  content::ContentId,
  yaml_config::ResolvedConfig,
};
use crate::error::AppError;
use crate::infra::{
  asset_client::{http_client, AssetClient},
  discovery::DiscoveryProvider,
  playback::AssetResolver,
  provider_set::ProviderSetResolver,
  static_chain::StaticChain,
  upload::Uploader,
};
use std::sync::Arc;

/// Services shared by the gateway handlers and the CLI commands
#[derive(Clone)]
pub struct AppState {
  pub chain: Arc<dyn ChainClient>,
  pub discovery: Arc<DiscoveryProvider>,
  pub assets: AssetClient,
  pub max_upload_bytes: u64,
}

impl AppState {
  pub fn new(
    chain: Arc<dyn ChainClient>,
    discovery: Arc<DiscoveryProvider>,
    assets: AssetClient,
    max_upload_bytes: u64,
  ) -> Self {
    Self {
      chain,
      discovery,
      assets,
      max_upload_bytes,
    }
  }

  /// Wire the static chain, HTTP client and endpoint cache from configuration
  pub fn from_config(config: &ResolvedConfig) -> Result<Self, AppError> {
    let client = http_client(config.request_timeout)?;
    let chain: Arc<dyn ChainClient> = Arc::new(StaticChain::from_config(config));
    let cache = EndpointCache::new(Arc::new(SystemClock), config.freshness);
    let discovery = Arc::new(DiscoveryProvider::new(client.clone(), chain.clone(), cache));

    Ok(Self::new(
      chain,
      discovery,
      AssetClient::new(client),
      config.max_upload_bytes,
    ))
  }

  pub fn resolver(&self, content_id: ContentId) -> AssetResolver {
    AssetResolver::new(
      content_id,
      self.discovery.clone(),
      ProviderSetResolver::new(self.chain.clone()),
      self.assets.clone(),
    )
  }

  pub fn uploader(&self) -> Uploader {
    Uploader::new(
      self.chain.clone(),
      self.discovery.clone(),
      self.assets.clone(),
      self.max_upload_bytes,
    )
  }
}
