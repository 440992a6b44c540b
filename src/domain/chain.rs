use async_trait::async_trait;
use thiserror::Error;

use crate::domain::content::{
  ContentId, ContentMetadata, ContentRegistration, DataObject, RelationshipId,
  StorageProviderId, StorageRelationship,
};

#[derive(Debug, Clone, Error)]
pub enum ChainError {
  #[error("Chain query failed: {0}")]
  Query(String),
  #[error("Transaction rejected: {0}")]
  Rejected(String),
}

/// The chain reads and writes the resolution and upload flows depend on
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
  /// Well-known discovery nodes, in the order they should be tried
  async fn bootstrap_endpoints(&self) -> Result<Vec<String>, ChainError>;

  /// Ids of every storage relationship recorded for a content object
  async fn relationship_ids(&self, content_id: &ContentId)
    -> Result<Vec<RelationshipId>, ChainError>;

  async fn relationship(
    &self,
    id: RelationshipId,
  ) -> Result<Option<StorageRelationship>, ChainError>;

  /// Providers currently staked as storage actors
  async fn staked_actors(&self) -> Result<Vec<StorageProviderId>, ChainError>;

  async fn data_object(&self, content_id: &ContentId) -> Result<Option<DataObject>, ChainError>;

  /// Submit the content registration and wait for it to be included
  async fn register_content(&self, registration: ContentRegistration) -> Result<(), ChainError>;

  async fn add_metadata(
    &self,
    content_id: &ContentId,
    metadata: ContentMetadata,
  ) -> Result<(), ChainError>;
}
