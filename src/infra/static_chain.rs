use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{
    chain::{ChainClient, ChainError},
    content::{
        ContentId, ContentMetadata, ContentRegistration, DataObject, RelationshipId,
        StorageProviderId, StorageRelationship,
    },
    yaml_config::ResolvedConfig,
};

struct RelationshipEntry {
    content_id: ContentId,
    relationship: StorageRelationship,
}

/// Chain backend serving state declared up front.
///
/// Registrations are accepted in memory and assigned a liaison round-robin
/// over the staked actors.
pub struct StaticChain {
    bootstrap_nodes: Vec<String>,
    staked_actors: Vec<StorageProviderId>,
    relationship_order: Vec<RelationshipId>,
    relationships: HashMap<RelationshipId, RelationshipEntry>,
    data_objects: RwLock<HashMap<ContentId, DataObject>>,
    metadata: RwLock<HashMap<ContentId, ContentMetadata>>,
    next_liaison: AtomicUsize,
    assign_liaisons: bool,
}

impl StaticChain {
    pub fn new(bootstrap_nodes: Vec<String>) -> Self {
        Self {
            bootstrap_nodes,
            staked_actors: Vec::new(),
            relationship_order: Vec::new(),
            relationships: HashMap::new(),
            data_objects: RwLock::new(HashMap::new()),
            metadata: RwLock::new(HashMap::new()),
            next_liaison: AtomicUsize::new(0),
            assign_liaisons: true,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        let mut chain = Self::new(config.bootstrap_nodes.clone())
            .with_staked_actors(config.staked_actors());

        for relationship in &config.chain.relationships {
            chain = chain.with_relationship(
                RelationshipId(relationship.id),
                relationship.content_id,
                StorageProviderId(relationship.storage_provider),
                relationship.ready,
            );
        }

        for object in &config.chain.data_objects {
            chain = chain.with_data_object(
                object.content_id,
                DataObject {
                    owner: object.owner,
                    liaison: StorageProviderId(object.liaison),
                    size_in_bytes: object.size_in_bytes,
                    type_id: crate::domain::content::DATA_OBJECT_TYPE_ID,
                    ipfs_content_id: object.ipfs_content_id.clone(),
                },
            );
        }

        tracing::debug!(
            "Static chain loaded: {} staked actor(s), {} relationship(s), {} data object(s)",
            chain.staked_actors.len(),
            chain.relationships.len(),
            chain.data_objects.read().len()
        );

        chain
    }

    pub fn with_staked_actors(mut self, actors: Vec<StorageProviderId>) -> Self {
        self.staked_actors = actors;
        self
    }

    pub fn with_relationship(
        mut self,
        id: RelationshipId,
        content_id: ContentId,
        storage_provider: StorageProviderId,
        ready: bool,
    ) -> Self {
        if !self.relationships.contains_key(&id) {
            self.relationship_order.push(id);
        }
        self.relationships.insert(
            id,
            RelationshipEntry {
                content_id,
                relationship: StorageRelationship {
                    storage_provider,
                    ready,
                },
            },
        );
        self
    }

    pub fn with_data_object(self, content_id: ContentId, object: DataObject) -> Self {
        self.data_objects.write().insert(content_id, object);
        self
    }

    /// Accept registrations without recording a data object, as if no liaison took the upload
    pub fn without_liaison_assignment(mut self) -> Self {
        self.assign_liaisons = false;
        self
    }

    pub fn metadata(&self, content_id: &ContentId) -> Option<ContentMetadata> {
        self.metadata.read().get(content_id).cloned()
    }
}

#[async_trait]
impl ChainClient for StaticChain {
    async fn bootstrap_endpoints(&self) -> Result<Vec<String>, ChainError> {
        Ok(self.bootstrap_nodes.clone())
    }

    async fn relationship_ids(
        &self,
        content_id: &ContentId,
    ) -> Result<Vec<RelationshipId>, ChainError> {
        Ok(self
            .relationship_order
            .iter()
            .filter(|id| {
                self.relationships
                    .get(id)
                    .is_some_and(|entry| &entry.content_id == content_id)
            })
            .copied()
            .collect())
    }

    async fn relationship(
        &self,
        id: RelationshipId,
    ) -> Result<Option<StorageRelationship>, ChainError> {
        Ok(self
            .relationships
            .get(&id)
            .map(|entry| entry.relationship.clone()))
    }

    async fn staked_actors(&self) -> Result<Vec<StorageProviderId>, ChainError> {
        Ok(self.staked_actors.clone())
    }

    async fn data_object(&self, content_id: &ContentId) -> Result<Option<DataObject>, ChainError> {
        Ok(self.data_objects.read().get(content_id).cloned())
    }

    async fn register_content(&self, registration: ContentRegistration) -> Result<(), ChainError> {
        if self
            .data_objects
            .read()
            .contains_key(&registration.content_id)
        {
            return Err(ChainError::Rejected(format!(
                "content {} is already registered",
                registration.content_id
            )));
        }

        if !self.assign_liaisons {
            tracing::debug!(
                "Accepted content {} without assigning a liaison",
                registration.content_id
            );
            return Ok(());
        }

        if self.staked_actors.is_empty() {
            return Err(ChainError::Rejected(
                "no storage providers available to act as liaison".to_string(),
            ));
        }

        let index = self.next_liaison.fetch_add(1, Ordering::Relaxed) % self.staked_actors.len();
        let liaison = self.staked_actors[index];

        self.data_objects.write().insert(
            registration.content_id,
            DataObject {
                owner: registration.owner,
                liaison,
                size_in_bytes: registration.size_in_bytes,
                type_id: registration.type_id,
                ipfs_content_id: registration.ipfs_content_id,
            },
        );

        tracing::info!(
            "Registered content {} with liaison {}",
            registration.content_id,
            liaison
        );
        Ok(())
    }

    async fn add_metadata(
        &self,
        content_id: &ContentId,
        metadata: ContentMetadata,
    ) -> Result<(), ChainError> {
        if !self.data_objects.read().contains_key(content_id) {
            return Err(ChainError::Rejected(format!(
                "content {} is not registered",
                content_id
            )));
        }
        self.metadata.write().insert(*content_id, metadata);
        Ok(())
    }
}
