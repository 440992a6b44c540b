use crate::server::{app_state::AppState, handlers};
use axum::{
  routing::{get, post},
  Router,
};

pub fn create_router() -> Router<AppState> {
  Router::new()
    .route("/health", get(handlers::health_check))
    .route("/v0/assets/{content_id}", get(handlers::resolve_asset))
    .route(
      "/v0/providers/{provider}/endpoint",
      get(handlers::provider_endpoint),
    )
    .route(
      "/v0/providers/{provider}/unreachable",
      post(handlers::report_unreachable),
    )
    .route("/v0/cache", get(handlers::cache_snapshot))
}
