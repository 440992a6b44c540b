use crate::infra::{discovery::DiscoveryError, playback::ResolutionError};
use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("Bad request")]
  BadRequest,

  #[error("Internal server error")]
  InternalError,

  #[error("Resolution error: {0}")]
  Resolution(#[from] ResolutionError),

  #[error("Discovery error: {0}")]
  Discovery(#[from] DiscoveryError),
}

impl IntoResponse for ServerError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      // Map domain errors to HTTP responses
      ServerError::Resolution(ResolutionError::NoProviders) => {
        (StatusCode::NOT_FOUND, "No storage providers found")
      },
      ServerError::Resolution(ResolutionError::Exhausted) => {
        (StatusCode::BAD_GATEWAY, "Unable to reach any storage provider")
      },
      ServerError::Discovery(DiscoveryError::ResolvingFailed) => {
        (StatusCode::BAD_GATEWAY, "Resolving failed")
      },

      // HTTP-specific errors
      ServerError::BadRequest => (StatusCode::BAD_REQUEST, "Bad request"),

      // Generic fallback - log details but return safe message
      _ => {
        tracing::error!("Server error: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
      },
    };

    (status, [("Content-Type", "text/plain")], message).into_response()
  }
}
