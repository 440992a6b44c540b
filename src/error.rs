use crate::domain::{config::ConfigError, yaml_config::YamlConfigError};
use crate::infra::{discovery::DiscoveryError, playback::ResolutionError, upload::UploadError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
  #[error("Configuration error: {0}")]
  Config(#[from] ConfigError),

  #[error("Configuration file error: {0}")]
  ConfigFile(#[from] YamlConfigError),

  #[error("HTTP client error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Discovery error: {0}")]
  Discovery(#[from] DiscoveryError),

  #[error("Resolution error: {0}")]
  Resolution(#[from] ResolutionError),

  #[error("Upload error: {0}")]
  Upload(#[from] UploadError),

  #[error("Server error: {0}")]
  Server(String),
}
