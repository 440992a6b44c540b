use cid::multihash::Multihash;
use cid::Cid;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::domain::{
    chain::{ChainClient, ChainError},
    content::{
        ContentId, ContentMetadata, ContentRegistration, StorageProviderId, DATA_OBJECT_TYPE_ID,
    },
};
use crate::infra::{
    asset_client::{AssetClient, TransferError},
    discovery::{DiscoveryError, DiscoveryProvider},
};

const HASH_CHUNK_SIZE: usize = 65535;
const SHA2_256: u64 = 0x12;
const RAW_CODEC: u64 = 0x55;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("You cannot upload an empty file.")]
    Empty,
    #[error("You can't upload files larger than {} MBytes in size.", mebibytes(.max))]
    TooLarge { size: u64, max: u64 },
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to hash file: {0}")]
    Hash(String),
    #[error("No active storage providers available")]
    NoActiveProviders,
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
    #[error("No Storage Provider assigned to process upload")]
    AssignmentMissing,
    #[error("Failed to contact storage provider: {0}")]
    Discovery(DiscoveryError),
    #[error("Upload failed: {0}")]
    Transfer(TransferError),
    #[error("Upload cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UploadStage {
    Validating,
    Hashing,
    Registering,
    Discovering,
    Uploading,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub stage: UploadStage,
    pub loaded: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn new(stage: UploadStage, total: u64) -> Self {
        Self {
            stage,
            loaded: 0,
            total,
        }
    }

    /// Rounded percentage of bytes handed to the upload body
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let percent = (self.loaded.saturating_mul(100) + self.total / 2) / self.total;
        percent.min(100) as u8
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub owner: u64,
    pub metadata: Option<ContentMetadata>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub content_id: ContentId,
    pub ipfs_content_id: String,
    pub liaison: StorageProviderId,
    pub url: Url,
    pub size_in_bytes: u64,
}

fn mebibytes(bytes: &u64) -> u64 {
    bytes / 1024 / 1024
}

pub fn validate_size(size: u64, max: u64) -> Result<(), UploadError> {
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > max {
        return Err(UploadError::TooLarge { size, max });
    }
    Ok(())
}

/// CIDv1 (raw codec, sha2-256) of the file contents
pub async fn compute_cid(path: &Path) -> Result<String, UploadError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let digest = hasher.finalize();
    let multihash =
        Multihash::<64>::wrap(SHA2_256, &digest).map_err(|e| UploadError::Hash(e.to_string()))?;
    Ok(Cid::new_v1(RAW_CODEC, multihash).to_string())
}

/// Registers new content on chain and pushes its bytes to the assigned liaison
pub struct Uploader {
    chain: Arc<dyn ChainClient>,
    discovery: Arc<DiscoveryProvider>,
    assets: AssetClient,
    max_upload_bytes: u64,
}

impl Uploader {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        discovery: Arc<DiscoveryProvider>,
        assets: AssetClient,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            chain,
            discovery,
            assets,
            max_upload_bytes,
        }
    }

    pub async fn upload(
        &self,
        request: UploadRequest,
        progress: watch::Sender<UploadProgress>,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt, UploadError> {
        progress.send_replace(UploadProgress::new(UploadStage::Validating, 0));

        let size = tokio::fs::metadata(&request.path).await?.len();
        validate_size(size, self.max_upload_bytes)?;

        let staked = self.guarded(cancel, self.chain.staked_actors()).await??;
        if staked.is_empty() {
            return Err(UploadError::NoActiveProviders);
        }

        progress.send_replace(UploadProgress::new(UploadStage::Hashing, size));
        let ipfs_content_id = self.guarded(cancel, compute_cid(&request.path)).await??;
        tracing::info!("Computed content hash {}", ipfs_content_id);

        let content_id = ContentId::generate();
        progress.send_replace(UploadProgress::new(UploadStage::Registering, size));
        let registration = ContentRegistration {
            owner: request.owner,
            content_id,
            type_id: DATA_OBJECT_TYPE_ID,
            size_in_bytes: size,
            ipfs_content_id: ipfs_content_id.clone(),
        };
        self.guarded(cancel, self.chain.register_content(registration))
            .await??;
        tracing::info!("Registered content {}", content_id);

        progress.send_replace(UploadProgress::new(UploadStage::Discovering, size));
        let data_object = self
            .guarded(cancel, self.chain.data_object(&content_id))
            .await??
            .ok_or(UploadError::AssignmentMissing)?;
        let liaison = data_object.liaison;

        let url = self
            .discovery
            .resolve_asset_endpoint(liaison, Some(&content_id), cancel)
            .await
            .map_err(|e| match e {
                DiscoveryError::Cancelled => UploadError::Cancelled,
                other => UploadError::Discovery(other),
            })?;

        progress.send_replace(UploadProgress::new(UploadStage::Uploading, size));
        let progress = Arc::new(progress);
        let reporter = progress.clone();
        let result = self
            .assets
            .put_file(
                &url,
                &request.path,
                size,
                move |loaded| {
                    reporter.send_replace(UploadProgress {
                        stage: UploadStage::Uploading,
                        loaded,
                        total: size,
                    });
                },
                cancel,
            )
            .await;

        match result {
            Ok(()) => {}
            Err(TransferError::Cancelled) => return Err(UploadError::Cancelled),
            Err(e) => {
                if e.is_unreachable() {
                    self.discovery.report_unreachable(liaison);
                }
                return Err(UploadError::Transfer(e));
            }
        }

        if let Some(metadata) = request.metadata {
            self.guarded(cancel, self.chain.add_metadata(&content_id, metadata))
                .await??;
        }

        progress.send_replace(UploadProgress {
            stage: UploadStage::Complete,
            loaded: size,
            total: size,
        });
        tracing::info!("Uploaded content {} to storage provider {}", content_id, liaison);

        Ok(UploadReceipt {
            content_id,
            ipfs_content_id,
            liaison,
            url,
            size_in_bytes: size,
        })
    }

    /// Await `future` unless the token fires first
    async fn guarded<F, T>(&self, cancel: &CancellationToken, future: F) -> Result<T, UploadError>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            value = future => Ok(value),
        }
    }
}
