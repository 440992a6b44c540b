use futures_util::future::try_join_all;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::{
    chain::{ChainClient, ChainError},
    content::{ContentId, StorageProviderId, StorageRelationship},
};

/// Finds the staked storage providers that report a content object as ready
#[derive(Clone)]
pub struct ProviderSetResolver {
    chain: Arc<dyn ChainClient>,
}

impl ProviderSetResolver {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Candidate providers in random order. An empty list is a valid answer.
    pub async fn resolve(
        &self,
        content_id: &ContentId,
    ) -> Result<Vec<StorageProviderId>, ChainError> {
        let mut candidates = self.ordered_candidates(content_id).await?;
        candidates.shuffle(&mut rand::thread_rng());
        Ok(candidates)
    }

    /// Candidate providers in staked-actor order
    pub async fn ordered_candidates(
        &self,
        content_id: &ContentId,
    ) -> Result<Vec<StorageProviderId>, ChainError> {
        let ids = self.chain.relationship_ids(content_id).await?;
        tracing::debug!(
            "Content {} has {} storage relationship(s)",
            content_id,
            ids.len()
        );

        let relationships =
            try_join_all(ids.into_iter().map(|id| self.chain.relationship(id))).await?;
        let staked = self.chain.staked_actors().await?;

        let candidates = select_candidates(relationships, &staked);
        tracing::debug!(
            "Content {} has {} ready staked provider(s)",
            content_id,
            candidates.len()
        );

        Ok(candidates)
    }
}

/// Keep present and ready relationships, dedupe their providers and
/// intersect with the staked actors. Output follows `staked` order.
pub fn select_candidates<I>(relationships: I, staked: &[StorageProviderId]) -> Vec<StorageProviderId>
where
    I: IntoIterator<Item = Option<StorageRelationship>>,
{
    let ready: HashSet<StorageProviderId> = relationships
        .into_iter()
        .flatten()
        .filter(|relationship| relationship.ready)
        .map(|relationship| relationship.storage_provider)
        .collect();

    let mut seen = HashSet::new();
    staked
        .iter()
        .copied()
        .filter(|provider| ready.contains(provider) && seen.insert(*provider))
        .collect()
}
