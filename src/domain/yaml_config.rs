use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::domain::config::{freshness_window, normalize_endpoint, MAX_FRESHNESS_SECONDS};
use crate::domain::content::{ContentId, StorageProviderId};

/// 500 MiB, the largest file a single upload accepts
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum YamlConfigError {
  #[error("Failed to read config file: {0}")]
  FileRead(#[from] std::io::Error),
  #[error("Failed to parse YAML: {0}")]
  YamlParse(#[from] serde_yml::Error),
  #[error("Configuration validation error: {0}")]
  Validation(String),
  #[error("Environment variable not found: {0}")]
  EnvVarNotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipConfig {
  /// Relationship id as recorded on chain
  pub id: u64,

  /// Content object the relationship is about
  pub content_id: ContentId,

  /// Provider claiming to host the content
  pub storage_provider: u64,

  /// Whether the provider finished preparing the content
  #[serde(default)]
  pub ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObjectConfig {
  pub content_id: ContentId,
  pub owner: u64,
  pub liaison: u64,
  pub size_in_bytes: u64,
  #[serde(default)]
  pub ipfs_content_id: String,
}

/// Chain state served by the offline chain backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
  #[serde(default)]
  pub staked_actors: Vec<u64>,

  #[serde(default)]
  pub relationships: Vec<RelationshipConfig>,

  #[serde(default)]
  pub data_objects: Vec<DataObjectConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YamlConfig {
  /// Bootstrap discovery nodes, tried in order
  #[serde(default)]
  pub bootstrap_nodes: Vec<String>,

  /// Environment variable holding a comma-separated list of extra bootstrap nodes
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bootstrap_nodes_env: Option<String>,

  #[serde(default)]
  pub chain: ChainConfig,

  /// Member id used as owner of uploaded content
  #[serde(skip_serializing_if = "Option::is_none")]
  pub member_id: Option<u64>,

  /// Seconds a resolved provider endpoint stays fresh
  #[serde(default = "default_freshness_seconds")]
  pub freshness_seconds: u64,

  /// Largest accepted upload in bytes
  #[serde(default = "default_max_upload_bytes")]
  pub max_upload_bytes: u64,

  /// HTTP request timeout in seconds
  #[serde(default = "default_request_timeout")]
  pub request_timeout: u64,

  /// HTTP gateway port (optional, defaults to 3000)
  #[serde(default = "default_port")]
  pub port: u16,

  /// Enable debug logging
  #[serde(default)]
  pub debug: bool,
}

fn default_freshness_seconds() -> u64 {
  600
}

fn default_max_upload_bytes() -> u64 {
  DEFAULT_MAX_UPLOAD_BYTES
}

fn default_request_timeout() -> u64 {
  30
}

fn default_port() -> u16 {
  3000
}

fn freshness_out_of_range(seconds: u64) -> YamlConfigError {
  YamlConfigError::Validation(format!(
    "freshnessSeconds must be between 1 and {}, got {}",
    MAX_FRESHNESS_SECONDS, seconds
  ))
}

impl YamlConfig {
  /// Load configuration from a YAML file
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, YamlConfigError> {
    let content = fs::read_to_string(path)?;
    Self::from_yaml_str(&content)
  }

  pub fn from_yaml_str(content: &str) -> Result<Self, YamlConfigError> {
    let config: YamlConfig = serde_yml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Validate the configuration
  pub fn validate(&self) -> Result<(), YamlConfigError> {
    if self.bootstrap_nodes.is_empty() && self.bootstrap_nodes_env.is_none() {
      return Err(YamlConfigError::Validation(
        "At least one bootstrap node must be configured".to_string(),
      ));
    }

    for node in &self.bootstrap_nodes {
      if node.trim().is_empty() {
        return Err(YamlConfigError::Validation(
          "Bootstrap node cannot be empty".to_string(),
        ));
      }
      // Unparseable nodes are skipped at resolution time, not rejected here
      if url::Url::parse(node.trim()).is_err() {
        tracing::warn!("Bootstrap node '{}' is not a valid URL and will be skipped", node);
      }
    }

    let mut relationship_ids = HashSet::new();
    for relationship in &self.chain.relationships {
      if !relationship_ids.insert(relationship.id) {
        return Err(YamlConfigError::Validation(format!(
          "Duplicate relationship id: {}",
          relationship.id
        )));
      }
    }

    let mut content_ids = HashSet::new();
    for object in &self.chain.data_objects {
      if !content_ids.insert(object.content_id) {
        return Err(YamlConfigError::Validation(format!(
          "Duplicate data object for content id: {}",
          object.content_id
        )));
      }
    }

    if freshness_window(self.freshness_seconds).is_none() {
      return Err(freshness_out_of_range(self.freshness_seconds));
    }

    if self.max_upload_bytes == 0 {
      return Err(YamlConfigError::Validation(
        "maxUploadBytes must be greater than 0".to_string(),
      ));
    }

    if self.request_timeout == 0 {
      return Err(YamlConfigError::Validation(
        "requestTimeout must be greater than 0".to_string(),
      ));
    }

    if self.port == 0 {
      return Err(YamlConfigError::Validation(
        "Port must be greater than 0".to_string(),
      ));
    }

    Ok(())
  }

  /// Resolve environment references and return a resolved configuration
  pub fn resolve_env_vars(&self) -> Result<ResolvedConfig, YamlConfigError> {
    let mut bootstrap_nodes: Vec<String> = self
      .bootstrap_nodes
      .iter()
      .map(|node| normalize_endpoint(node))
      .collect();

    if let Some(env_name) = &self.bootstrap_nodes_env {
      let value = std::env::var(env_name).map_err(|_| {
        YamlConfigError::EnvVarNotFound(format!(
          "bootstrapNodesEnv: environment variable '{}' not found",
          env_name
        ))
      })?;
      bootstrap_nodes.extend(
        value
          .split(',')
          .map(str::trim)
          .filter(|node| !node.is_empty())
          .map(normalize_endpoint),
      );
    }

    if bootstrap_nodes.is_empty() {
      return Err(YamlConfigError::Validation(
        "At least one bootstrap node must be configured".to_string(),
      ));
    }

    Ok(ResolvedConfig {
      bootstrap_nodes,
      chain: self.chain.clone(),
      member_id: self.member_id,
      freshness: freshness_window(self.freshness_seconds)
        .ok_or_else(|| freshness_out_of_range(self.freshness_seconds))?,
      max_upload_bytes: self.max_upload_bytes,
      request_timeout: std::time::Duration::from_secs(self.request_timeout),
      port: self.port,
      debug: self.debug,
    })
  }
}

/// Fully resolved configuration with all environment variables loaded
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
  pub bootstrap_nodes: Vec<String>,
  pub chain: ChainConfig,
  pub member_id: Option<u64>,
  pub freshness: Duration,
  pub max_upload_bytes: u64,
  pub request_timeout: std::time::Duration,
  pub port: u16,
  pub debug: bool,
}

impl ResolvedConfig {
  pub fn staked_actors(&self) -> Vec<StorageProviderId> {
    self
      .chain
      .staked_actors
      .iter()
      .copied()
      .map(StorageProviderId)
      .collect()
  }
}
