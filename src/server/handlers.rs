use crate::domain::{
    cache::ProviderEndpointRecord,
    content::StorageProviderId,
};
use crate::infra::playback::ResolutionState;
use crate::server::{error::ServerError, validation, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetResponse {
    pub provider: StorageProviderId,
    pub url: String,
    pub download_url: String,
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResponse {
    pub provider: StorageProviderId,
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointQuery {
    pub content_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CacheEntry {
    pub provider: StorageProviderId,
    #[serde(flatten)]
    pub record: ProviderEndpointRecord,
}

pub async fn resolve_asset(
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    let content_id = validation::parse_content_id(&content_id)?;

    let resolver = state.resolver(content_id);
    match resolver.start().await {
        ResolutionState::Resolved(asset) => Ok(Json(AssetResponse {
            provider: asset.provider,
            url: asset.url.to_string(),
            download_url: asset.download_url().to_string(),
            content_type: asset.content_type,
        })),
        ResolutionState::Failed(e) => Err(e.into()),
        ResolutionState::Idle | ResolutionState::Resolving => Err(ServerError::InternalError),
    }
}

pub async fn provider_endpoint(
    Path(provider): Path<String>,
    Query(query): Query<EndpointQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    let provider = validation::parse_provider_id(&provider)?;
    let content_id = query
        .content_id
        .as_deref()
        .map(validation::parse_content_id)
        .transpose()?;

    let cancel = CancellationToken::new();

    let url = state
        .discovery
        .resolve_asset_endpoint(provider, content_id.as_ref(), &cancel)
        .await?;

    Ok(Json(EndpointResponse {
        provider,
        url: url.to_string(),
    }))
}

pub async fn report_unreachable(
    Path(provider): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    let provider = validation::parse_provider_id(&provider)?;
    state.discovery.report_unreachable(provider);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cache_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    let entries: Vec<CacheEntry> = state
        .discovery
        .cache()
        .snapshot()
        .into_iter()
        .map(|(provider, record)| CacheEntry { provider, record })
        .collect();
    Json(entries)
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
