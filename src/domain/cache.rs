use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::clock::{Clock, SystemClock};
use crate::domain::content::StorageProviderId;

/// How long a resolved endpoint is trusted before bootstrap nodes are asked again
pub const DEFAULT_FRESHNESS_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEndpointRecord {
  pub asset_api_endpoint: String,
  pub unreachable_reports: u32,
  pub resolved_at: DateTime<Utc>,
}

/// Resolved asset endpoints keyed by storage provider.
///
/// Records are only created by a successful resolution. Stale records are
/// never purged, they are replaced wholesale the next time the provider is
/// resolved. The lock guards map access only; callers never hold it across
/// network I/O, so two concurrent resolutions of one provider both go to the
/// network and the later write wins.
pub struct EndpointCache {
  records: Mutex<HashMap<StorageProviderId, ProviderEndpointRecord>>,
  clock: Arc<dyn Clock>,
  freshness: Duration,
}

impl EndpointCache {
  pub fn new(clock: Arc<dyn Clock>, freshness: Duration) -> Self {
    Self {
      records: Mutex::new(HashMap::new()),
      clock,
      freshness,
    }
  }

  pub fn freshness(&self) -> Duration {
    self.freshness
  }

  /// Record for the provider if it was resolved within the freshness window
  pub fn fresh(&self, provider: StorageProviderId) -> Option<ProviderEndpointRecord> {
    let now = self.clock.now();
    self
      .records
      .lock()
      .get(&provider)
      .filter(|record| now - record.resolved_at < self.freshness)
      .cloned()
  }

  /// Record for the provider regardless of age
  pub fn get(&self, provider: StorageProviderId) -> Option<ProviderEndpointRecord> {
    self.records.lock().get(&provider).cloned()
  }

  pub fn store_resolved(&self, provider: StorageProviderId, endpoint: String) {
    let record = ProviderEndpointRecord {
      asset_api_endpoint: endpoint,
      unreachable_reports: 0,
      resolved_at: self.clock.now(),
    };
    self.records.lock().insert(provider, record);
  }

  /// Bump the unreachable counter. Returns false when the provider was never resolved.
  pub fn report_unreachable(&self, provider: StorageProviderId) -> bool {
    match self.records.lock().get_mut(&provider) {
      Some(record) => {
        record.unreachable_reports = record.unreachable_reports.saturating_add(1);
        true
      },
      None => false,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.records.lock().is_empty()
  }

  /// Copy of every record, ordered by provider id
  pub fn snapshot(&self) -> Vec<(StorageProviderId, ProviderEndpointRecord)> {
    let mut entries: Vec<_> = self
      .records
      .lock()
      .iter()
      .map(|(provider, record)| (*provider, record.clone()))
      .collect();
    entries.sort_by_key(|(provider, _)| *provider);
    entries
  }
}

impl Default for EndpointCache {
  fn default() -> Self {
    Self::new(
      Arc::new(SystemClock),
      Duration::minutes(DEFAULT_FRESHNESS_MINUTES),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::clock::ManualClock;

  fn cache_with_clock() -> (EndpointCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let cache = EndpointCache::new(
      clock.clone(),
      Duration::minutes(DEFAULT_FRESHNESS_MINUTES),
    );
    (cache, clock)
  }

  #[test]
  fn test_fresh_within_window() {
    let (cache, clock) = cache_with_clock();
    let provider = StorageProviderId(1);
    cache.store_resolved(provider, "http://sp1".to_string());

    clock.advance(Duration::minutes(9));
    let record = cache.fresh(provider).expect("record should be fresh");
    assert_eq!(record.asset_api_endpoint, "http://sp1");
  }

  #[test]
  fn test_stale_after_window() {
    let (cache, clock) = cache_with_clock();
    let provider = StorageProviderId(1);
    cache.store_resolved(provider, "http://sp1".to_string());

    clock.advance(Duration::minutes(10));
    assert!(cache.fresh(provider).is_none());
    // Stale records stay around until replaced
    assert!(cache.get(provider).is_some());
  }

  #[test]
  fn test_report_unreachable_counts() {
    let (cache, _clock) = cache_with_clock();
    let provider = StorageProviderId(7);
    cache.store_resolved(provider, "http://sp7".to_string());

    assert!(cache.report_unreachable(provider));
    assert!(cache.report_unreachable(provider));
    assert_eq!(cache.get(provider).unwrap().unreachable_reports, 2);
  }

  #[test]
  fn test_report_unreachable_without_record_is_noop() {
    let (cache, _clock) = cache_with_clock();
    assert!(!cache.report_unreachable(StorageProviderId(3)));
    assert!(cache.is_empty());
  }

  #[test]
  fn test_store_resolved_replaces_record() {
    let (cache, clock) = cache_with_clock();
    let provider = StorageProviderId(2);
    cache.store_resolved(provider, "http://old".to_string());
    cache.report_unreachable(provider);

    clock.advance(Duration::minutes(15));
    cache.store_resolved(provider, "http://new".to_string());

    let record = cache.get(provider).unwrap();
    assert_eq!(record.asset_api_endpoint, "http://new");
    assert_eq!(record.unreachable_reports, 0);
    assert_eq!(record.resolved_at, clock.now());
  }

  #[test]
  fn test_snapshot_sorted() {
    let (cache, _clock) = cache_with_clock();
    cache.store_resolved(StorageProviderId(9), "http://b".to_string());
    cache.store_resolved(StorageProviderId(3), "http://a".to_string());

    let ids: Vec<_> = cache.snapshot().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![StorageProviderId(3), StorageProviderId(9)]);
  }
}
