//! Common test utilities for integration tests
//!
//! Builds an `AppState` over a `StaticChain` and a manually driven clock, and
//! mounts bootstrap discovery responses on wiremock servers.

use asset_discovery::domain::cache::{EndpointCache, DEFAULT_FRESHNESS_MINUTES};
use asset_discovery::domain::chain::ChainClient;
use asset_discovery::domain::clock::ManualClock;
use asset_discovery::domain::content::ContentId;
use asset_discovery::domain::yaml_config::DEFAULT_MAX_UPLOAD_BYTES;
use asset_discovery::infra::asset_client::{http_client, AssetClient};
use asset_discovery::infra::discovery::DiscoveryProvider;
use asset_discovery::infra::static_chain::StaticChain;
use asset_discovery::server::AppState;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Everything a test needs to drive and inspect one gateway instance
#[allow(dead_code)]
pub struct TestHarness {
  pub chain: Arc<StaticChain>,
  pub clock: Arc<ManualClock>,
  pub discovery: Arc<DiscoveryProvider>,
  pub state: AppState,
}

impl TestHarness {
  pub fn new(chain: StaticChain) -> Self {
    Self::with_max_upload(chain, DEFAULT_MAX_UPLOAD_BYTES)
  }

  pub fn with_max_upload(chain: StaticChain, max_upload_bytes: u64) -> Self {
    let chain = Arc::new(chain);
    let clock = Arc::new(ManualClock::default());
    let client = http_client(Duration::from_secs(5)).expect("Failed to build HTTP client");

    let cache = EndpointCache::new(
      clock.clone(),
      chrono::Duration::minutes(DEFAULT_FRESHNESS_MINUTES),
    );
    let dyn_chain: Arc<dyn ChainClient> = chain.clone();
    let discovery = Arc::new(DiscoveryProvider::new(
      client.clone(),
      dyn_chain.clone(),
      cache,
    ));

    let state = AppState::new(
      dyn_chain,
      discovery.clone(),
      AssetClient::new(client),
      max_upload_bytes,
    );

    Self {
      chain,
      clock,
      discovery,
      state,
    }
  }
}

/// Deterministic content id built from a repeated byte
#[allow(dead_code)]
pub fn content(byte: u8) -> ContentId {
  ContentId::from_bytes([byte; 32])
}

/// Body a bootstrap node returns for a provider whose asset API lives at `endpoint`
#[allow(dead_code)]
pub fn discovery_body(endpoint: &str) -> serde_json::Value {
  let service_info = serde_json::json!({ "asset": { "endpoint": endpoint } });
  serde_json::json!({ "serialized": service_info.to_string() })
}

/// Answer `GET /discover/v0/{provider}` with the given asset endpoint
#[allow(dead_code)]
pub async fn mount_discovery(server: &MockServer, provider: u64, endpoint: &str) {
  Mock::given(method("GET"))
    .and(path(format!("/discover/v0/{}", provider)))
    .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body(endpoint)))
    .mount(server)
    .await;
}

/// Asset endpoint for provider `provider` hosted under a path prefix of `server`
#[allow(dead_code)]
pub fn provider_endpoint(server: &MockServer, provider: u64) -> String {
  format!("{}/sp{}", server.uri(), provider)
}

/// Path the asset API serves `content_id` on for a provider mounted via `provider_endpoint`
#[allow(dead_code)]
pub fn asset_path(provider: u64, content_id: &ContentId) -> String {
  format!("/sp{}/asset/v0/{}", provider, content_id)
}
