use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Data object type used for every media upload
pub const DATA_OBJECT_TYPE_ID: u64 = 1;

/// Content type assumed when an asset server does not report one
pub const DEFAULT_CONTENT_TYPE: &str = "video/video";

const CONTENT_ID_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
  #[error("Content id must be {expected} hex characters, got {actual}")]
  ContentIdLength { expected: usize, actual: usize },
  #[error("Content id is not valid hex")]
  ContentIdHex,
  #[error("Storage provider id must be a non-negative integer")]
  ProviderId,
}

/// Opaque identifier for an uploaded media asset
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId([u8; CONTENT_ID_LEN]);

impl ContentId {
  /// Generate a fresh random content id, done client-side before upload
  pub fn generate() -> Self {
    let mut bytes = [0u8; CONTENT_ID_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    Self(bytes)
  }

  pub fn from_bytes(bytes: [u8; CONTENT_ID_LEN]) -> Self {
    Self(bytes)
  }

  /// Text form used in URLs and on the wire
  pub fn encode(&self) -> String {
    hex::encode(self.0)
  }
}

impl fmt::Display for ContentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.encode())
  }
}

impl fmt::Debug for ContentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ContentId({})", self.encode())
  }
}

impl FromStr for ContentId {
  type Err = IdParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if s.len() != CONTENT_ID_LEN * 2 {
      return Err(IdParseError::ContentIdLength {
        expected: CONTENT_ID_LEN * 2,
        actual: s.len(),
      });
    }

    let mut bytes = [0u8; CONTENT_ID_LEN];
    hex::decode_to_slice(s, &mut bytes).map_err(|_| IdParseError::ContentIdHex)?;
    Ok(Self(bytes))
  }
}

impl TryFrom<String> for ContentId {
  type Error = IdParseError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<ContentId> for String {
  fn from(id: ContentId) -> Self {
    id.encode()
  }
}

/// Storage provider actor id; cache key and subject of unreachable reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageProviderId(pub u64);

impl fmt::Display for StorageProviderId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl FromStr for StorageProviderId {
  type Err = IdParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    s.trim()
      .parse::<u64>()
      .map(StorageProviderId)
      .map_err(|_| IdParseError::ProviderId)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(pub u64);

/// Chain claim that a provider hosts (or is preparing to host) a content object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRelationship {
  pub storage_provider: StorageProviderId,
  pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObject {
  pub owner: u64,
  pub liaison: StorageProviderId,
  pub size_in_bytes: u64,
  pub type_id: u64,
  pub ipfs_content_id: String,
}

/// Parameters of the content registration transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRegistration {
  pub owner: u64,
  pub content_id: ContentId,
  pub type_id: u64,
  pub size_in_bytes: u64,
  pub ipfs_content_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub thumbnail: Option<String>,
}

/// How a player should treat an asset, derived from its content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Video,
  Audio,
  Unsupported,
}

impl MediaKind {
  pub fn from_content_type(content_type: &str) -> Self {
    match content_type.split_once('/').map(|(prefix, _)| prefix) {
      Some("video") => MediaKind::Video,
      Some("audio") => MediaKind::Audio,
      _ => MediaKind::Unsupported,
    }
  }
}
