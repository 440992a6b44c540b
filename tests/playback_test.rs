//! Provider selection and sequential probing for playback

mod common;

use asset_discovery::domain::content::{RelationshipId, StorageProviderId};
use asset_discovery::infra::playback::{ResolutionError, ResolutionState};
use asset_discovery::infra::provider_set::ProviderSetResolver;
use asset_discovery::infra::static_chain::StaticChain;
use common::{asset_path, content, mount_discovery, provider_endpoint, TestHarness};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_probe(server: &MockServer, provider: u64, id: &str, response: ResponseTemplate) {
  Mock::given(method("HEAD"))
    .and(path(format!("/sp{}/asset/v0/{}", provider, id)))
    .respond_with(response)
    .mount(server)
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_candidates_reported_until_one_answers() {
  let server = MockServer::start().await;
  let id = content(0xab);
  let encoded = id.to_string();

  for provider in 1..=3 {
    mount_discovery(&server, provider, &provider_endpoint(&server, provider)).await;
  }
  mount_probe(&server, 1, &encoded, ResponseTemplate::new(503)).await;
  mount_probe(&server, 2, &encoded, ResponseTemplate::new(500)).await;
  mount_probe(
    &server,
    3,
    &encoded,
    ResponseTemplate::new(200).insert_header("content-type", "video/mp4"),
  )
  .await;

  let harness = TestHarness::new(StaticChain::new(vec![server.uri()]));
  let resolver = harness.state.resolver(id);

  let asset = resolver
    .probe_candidates(
      vec![StorageProviderId(1), StorageProviderId(2), StorageProviderId(3)],
      &CancellationToken::new(),
    )
    .await
    .expect("Third provider should answer");

  assert_eq!(asset.provider, StorageProviderId(3));
  assert_eq!(asset.content_type, "video/mp4");
  assert_eq!(
    asset.url.as_str(),
    format!("{}{}", server.uri(), asset_path(3, &id))
  );

  let cache = harness.discovery.cache();
  assert_eq!(cache.get(StorageProviderId(1)).unwrap().unreachable_reports, 1);
  assert_eq!(cache.get(StorageProviderId(2)).unwrap().unreachable_reports, 1);
  assert_eq!(cache.get(StorageProviderId(3)).unwrap().unreachable_reports, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_asset_is_not_unreachable() {
  let server = MockServer::start().await;
  let id = content(0xab);

  mount_discovery(&server, 1, &provider_endpoint(&server, 1)).await;
  mount_probe(&server, 1, &id.to_string(), ResponseTemplate::new(404)).await;

  let harness = TestHarness::new(StaticChain::new(vec![server.uri()]));
  let resolver = harness.state.resolver(id);

  let result = resolver
    .probe_candidates(vec![StorageProviderId(1)], &CancellationToken::new())
    .await;

  assert!(matches!(result, Err(ResolutionError::Exhausted)));
  let record = harness.discovery.cache().get(StorageProviderId(1)).unwrap();
  assert_eq!(record.unreachable_reports, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_undiscoverable_provider_is_skipped_without_report() {
  let server = MockServer::start().await;
  let id = content(0xcd);

  // Provider 1 is unknown to the bootstrap node
  mount_discovery(&server, 2, &provider_endpoint(&server, 2)).await;
  mount_probe(&server, 2, &id.to_string(), ResponseTemplate::new(200)).await;

  let harness = TestHarness::new(StaticChain::new(vec![server.uri()]));
  let resolver = harness.state.resolver(id);

  let asset = resolver
    .probe_candidates(
      vec![StorageProviderId(1), StorageProviderId(2)],
      &CancellationToken::new(),
    )
    .await
    .unwrap();

  assert_eq!(asset.provider, StorageProviderId(2));
  assert_eq!(asset.content_type, "video/video");
  assert!(harness.discovery.cache().get(StorageProviderId(1)).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_resolves_single_ready_provider() {
  let server = MockServer::start().await;
  let id = content(0xab);
  let other = content(0xcd);

  mount_discovery(&server, 2, &provider_endpoint(&server, 2)).await;
  mount_probe(
    &server,
    2,
    &id.to_string(),
    ResponseTemplate::new(200).insert_header("content-type", "audio/ogg"),
  )
  .await;

  // Provider 1 is not ready, provider 3 is not staked, provider 4 holds other content
  let chain = StaticChain::new(vec![server.uri()])
    .with_staked_actors(vec![
      StorageProviderId(1),
      StorageProviderId(2),
      StorageProviderId(4),
    ])
    .with_relationship(RelationshipId(1), id, StorageProviderId(1), false)
    .with_relationship(RelationshipId(2), id, StorageProviderId(2), true)
    .with_relationship(RelationshipId(3), id, StorageProviderId(3), true)
    .with_relationship(RelationshipId(4), other, StorageProviderId(4), true)
    .with_relationship(RelationshipId(5), id, StorageProviderId(2), true);

  let harness = TestHarness::new(chain);
  let resolver = harness.state.resolver(id);

  match resolver.start().await {
    ResolutionState::Resolved(asset) => {
      assert_eq!(asset.provider, StorageProviderId(2));
      assert_eq!(
        asset.download_url().as_str(),
        format!("{}{}?download", server.uri(), asset_path(2, &id))
      );
    },
    other => panic!("Expected Resolved, got {:?}", other),
  }

  // A second start keeps the resolved asset without probing again
  assert!(matches!(resolver.start().await, ResolutionState::Resolved(_)));
  let probes = server
    .received_requests()
    .await
    .unwrap()
    .into_iter()
    .filter(|request| request.method.as_str() == "HEAD")
    .count();
  assert_eq!(probes, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_candidate_set_deduplicates_and_intersects() {
  let id = content(0xab);
  let chain = StaticChain::new(vec![])
    .with_staked_actors(vec![
      StorageProviderId(3),
      StorageProviderId(1),
      StorageProviderId(2),
    ])
    .with_relationship(RelationshipId(10), id, StorageProviderId(1), true)
    .with_relationship(RelationshipId(11), id, StorageProviderId(1), true)
    .with_relationship(RelationshipId(12), id, StorageProviderId(3), true)
    .with_relationship(RelationshipId(13), id, StorageProviderId(9), true);

  let resolver = ProviderSetResolver::new(Arc::new(chain));

  let ordered = resolver.ordered_candidates(&id).await.unwrap();
  assert_eq!(ordered, vec![StorageProviderId(3), StorageProviderId(1)]);

  let mut shuffled = resolver.resolve(&id).await.unwrap();
  shuffled.sort();
  assert_eq!(shuffled, vec![StorageProviderId(1), StorageProviderId(3)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_providers_makes_no_network_calls() {
  let server = MockServer::start().await;
  let harness = TestHarness::new(
    StaticChain::new(vec![server.uri()]).with_staked_actors(vec![StorageProviderId(1)]),
  );
  let resolver = harness.state.resolver(content(0xef));

  match resolver.start().await {
    ResolutionState::Failed(ResolutionError::NoProviders) => {},
    other => panic!("Expected NoProviders, got {:?}", other),
  }
  assert_eq!(
    ResolutionError::NoProviders.to_string(),
    "No storage providers found"
  );
  assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_resolution_can_be_retried() {
  let server = MockServer::start().await;
  let id = content(0xab);

  mount_discovery(&server, 1, &provider_endpoint(&server, 1)).await;
  mount_probe(&server, 1, &id.to_string(), ResponseTemplate::new(502)).await;

  let chain = StaticChain::new(vec![server.uri()])
    .with_staked_actors(vec![StorageProviderId(1)])
    .with_relationship(RelationshipId(1), id, StorageProviderId(1), true);
  let harness = TestHarness::new(chain);
  let resolver = harness.state.resolver(id);

  assert!(matches!(
    resolver.start().await,
    ResolutionState::Failed(ResolutionError::Exhausted)
  ));
  assert_eq!(
    harness
      .discovery
      .cache()
      .get(StorageProviderId(1))
      .unwrap()
      .unreachable_reports,
    1
  );

  server.reset().await;
  mount_probe(&server, 1, &id.to_string(), ResponseTemplate::new(200)).await;

  // The endpoint is still fresh, so only the probe hits the network
  assert!(matches!(resolver.start().await, ResolutionState::Resolved(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_mid_loop_tries_no_further_candidates() {
  let server = MockServer::start().await;
  let id = content(0xab);

  // Both candidates stall, so whichever is probed first is in flight when stopped
  for provider in 1..=2 {
    mount_discovery(&server, provider, &provider_endpoint(&server, provider)).await;
    mount_probe(
      &server,
      provider,
      &id.to_string(),
      ResponseTemplate::new(200).set_delay(Duration::from_secs(3)),
    )
    .await;
  }

  let chain = StaticChain::new(vec![server.uri()])
    .with_staked_actors(vec![StorageProviderId(1), StorageProviderId(2)])
    .with_relationship(RelationshipId(1), id, StorageProviderId(1), true)
    .with_relationship(RelationshipId(2), id, StorageProviderId(2), true);
  let harness = TestHarness::new(chain);
  let resolver = Arc::new(harness.state.resolver(id));

  let running = resolver.clone();
  let attempt = tokio::spawn(async move { running.start().await });

  tokio::time::sleep(Duration::from_millis(300)).await;
  resolver.stop();

  let outcome = tokio::time::timeout(Duration::from_secs(2), attempt)
    .await
    .expect("Stopped attempt should finish promptly")
    .unwrap();
  assert!(matches!(outcome, ResolutionState::Idle));

  // Give a wrongly continuing loop time to reach the second candidate
  tokio::time::sleep(Duration::from_millis(300)).await;

  let requests = server.received_requests().await.unwrap();
  let discoveries = requests
    .iter()
    .filter(|request| request.url.path().starts_with("/discover/v0/"))
    .count();
  let probes = requests
    .iter()
    .filter(|request| request.method.as_str() == "HEAD")
    .count();
  assert_eq!(discoveries, 1);
  assert_eq!(probes, 1);

  for (_, record) in harness.discovery.cache().snapshot() {
    assert_eq!(record.unreachable_reports, 0);
  }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_cancels_without_reporting() {
  let server = MockServer::start().await;
  let id = content(0xab);

  mount_discovery(&server, 1, &provider_endpoint(&server, 1)).await;
  mount_probe(
    &server,
    1,
    &id.to_string(),
    ResponseTemplate::new(200).set_delay(Duration::from_secs(3)),
  )
  .await;

  let chain = StaticChain::new(vec![server.uri()])
    .with_staked_actors(vec![StorageProviderId(1)])
    .with_relationship(RelationshipId(1), id, StorageProviderId(1), true);
  let harness = TestHarness::new(chain);
  let resolver = Arc::new(harness.state.resolver(id));

  let running = resolver.clone();
  let attempt = tokio::spawn(async move { running.start().await });

  tokio::time::sleep(Duration::from_millis(300)).await;
  assert!(matches!(resolver.state(), ResolutionState::Resolving));
  resolver.stop();

  let outcome = tokio::time::timeout(Duration::from_secs(2), attempt)
    .await
    .expect("Stopped attempt should finish promptly")
    .unwrap();

  assert!(matches!(outcome, ResolutionState::Idle));
  assert!(matches!(resolver.state(), ResolutionState::Idle));
  let record = harness.discovery.cache().get(StorageProviderId(1)).unwrap();
  assert_eq!(record.unreachable_reports, 0);
}
