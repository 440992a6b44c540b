use crate::domain::content::{ContentId, StorageProviderId};
use crate::server::error::ServerError;

pub fn parse_content_id(raw: &str) -> Result<ContentId, ServerError> {
  raw.parse().map_err(|e| {
    tracing::debug!("Rejected content id '{}': {}", raw, e);
    ServerError::BadRequest
  })
}

pub fn parse_provider_id(raw: &str) -> Result<StorageProviderId, ServerError> {
  raw.parse().map_err(|_| ServerError::BadRequest)
}
