use asset_discovery::domain::config::{
    freshness_window, ClientConfig, ConfigError, ConfigValidator, ServeConfig,
};
use asset_discovery::domain::content::{ContentId, ContentMetadata, StorageProviderId};
use asset_discovery::domain::yaml_config::{ResolvedConfig, YamlConfig};
use asset_discovery::error::AppError;
use asset_discovery::infra::playback::ResolutionState;
use asset_discovery::infra::upload::{UploadProgress, UploadRequest, UploadStage};
use asset_discovery::server::{run_server, AppState};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "asset-discovery")]
#[command(about = "Resolve and upload media assets through storage providers")]
struct Cli {
    #[arg(
        short = 'c',
        long = "config",
        env = "CONFIG_FILE",
        help = "Path to YAML configuration file"
    )]
    config_file: PathBuf,

    #[arg(long, env = "DEBUG", help = "Enable debug logging")]
    debug: bool,

    #[command(flatten)]
    client: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP resolution gateway
    Serve(ServeConfig),

    /// Find a reachable storage provider for a content id
    Resolve { content_id: String },

    /// Resolve a storage provider's asset endpoint through the bootstrap nodes
    Endpoint {
        provider: u64,
        #[arg(long)]
        content_id: Option<String>,
    },

    /// Register a file on chain and upload it to its liaison
    Upload {
        file: PathBuf,

        #[arg(long, env = "MEMBER_ID", help = "Member id owning the new content")]
        member_id: Option<u64>,

        #[arg(long, help = "Title to publish as content metadata")]
        title: Option<String>,

        #[arg(long, requires = "title")]
        description: Option<String>,

        #[arg(long, requires = "title")]
        thumbnail: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let yaml_config = match YamlConfig::from_file(&cli.config_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!();
            eprintln!("Failed to load configuration file: {}", e);
            eprintln!();
            std::process::exit(1);
        }
    };

    // Initialize logging
    if cli.debug || yaml_config.debug {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }

    tracing::info!("Loaded configuration from: {}", cli.config_file.display());

    let mut config = match yaml_config.resolve_env_vars() {
        Ok(config) => config,
        Err(e) => {
            eprintln!();
            eprintln!("Configuration error: {}", e);
            eprintln!();
            std::process::exit(1);
        }
    };

    if let Err(e) = cli.client.validate().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    if let Err(e) = apply_overrides(&mut config, &cli.client) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    tracing::info!("  Bootstrap nodes: {}", config.bootstrap_nodes.len());
    for node in &config.bootstrap_nodes {
        tracing::info!("    - {}", node);
    }

    let state = AppState::from_config(&config)?;

    let result = match cli.command {
        Command::Serve(serve) => serve_gateway(state, &config, serve).await,
        Command::Resolve { content_id } => resolve(state, &content_id).await,
        Command::Endpoint {
            provider,
            content_id,
        } => endpoint(state, provider, content_id.as_deref()).await,
        Command::Upload {
            file,
            member_id,
            title,
            description,
            thumbnail,
        } => {
            let metadata = title.map(|name| ContentMetadata {
                name,
                description,
                thumbnail,
            });
            upload(state, &config, file, member_id, metadata).await
        }
    };

    if let Err(e) = result {
        eprintln!();
        eprintln!("{}", e);
        eprintln!();
        std::process::exit(1);
    }

    Ok(())
}

fn apply_overrides(config: &mut ResolvedConfig, client: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(timeout) = client.request_timeout {
        config.request_timeout = std::time::Duration::from_secs(timeout);
    }
    if let Some(freshness) = client.freshness_seconds {
        config.freshness = freshness_window(freshness).ok_or(ConfigError::Invalid(
            "endpoint freshness must be between 1 and 604800 seconds",
        ))?;
    }
    Ok(())
}

/// Token cancelled on Ctrl-C
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

async fn serve_gateway(
    state: AppState,
    config: &ResolvedConfig,
    serve: ServeConfig,
) -> Result<(), AppError> {
    serve.validate().await?;
    let port = serve.port.unwrap_or(config.port);

    tracing::info!("Gateway starting on port {}", port);
    run_server(state, port)
        .await
        .map_err(|e| AppError::Server(e.to_string()))
}

async fn resolve(state: AppState, content_id: &str) -> Result<(), AppError> {
    let content_id: ContentId = content_id
        .parse()
        .map_err(|_| ConfigError::Invalid("content id must be 64 hex characters"))?;

    let resolver = state.resolver(content_id);
    let cancel = interrupt_token();
    let stopper = cancel.clone();

    let outcome = tokio::select! {
        outcome = resolver.start() => outcome,
        _ = stopper.cancelled() => {
            resolver.stop();
            resolver.state()
        }
    };

    match outcome {
        ResolutionState::Resolved(asset) => {
            println!("provider:      {}", asset.provider);
            println!("url:           {}", asset.url);
            println!("download url:  {}", asset.download_url());
            println!("content type:  {}", asset.content_type);
            Ok(())
        }
        ResolutionState::Failed(e) => Err(e.into()),
        ResolutionState::Idle | ResolutionState::Resolving => {
            Err(AppError::Server("resolution interrupted".to_string()))
        }
    }
}

async fn endpoint(
    state: AppState,
    provider: u64,
    content_id: Option<&str>,
) -> Result<(), AppError> {
    let content_id = content_id
        .map(|raw| raw.parse::<ContentId>())
        .transpose()
        .map_err(|_| ConfigError::Invalid("content id must be 64 hex characters"))?;

    let cancel = interrupt_token();
    let url = state
        .discovery
        .resolve_asset_endpoint(StorageProviderId(provider), content_id.as_ref(), &cancel)
        .await?;

    println!("{}", url);
    Ok(())
}

async fn upload(
    state: AppState,
    config: &ResolvedConfig,
    file: PathBuf,
    member_id: Option<u64>,
    metadata: Option<ContentMetadata>,
) -> Result<(), AppError> {
    let owner = member_id
        .or(config.member_id)
        .ok_or(ConfigError::MissingField("MEMBER_ID"))?;

    let (progress_tx, mut progress_rx) =
        watch::channel(UploadProgress::new(UploadStage::Validating, 0));

    let reporter = tokio::spawn(async move {
        let mut last_percent = None;
        let mut last_stage = None;
        while progress_rx.changed().await.is_ok() {
            let progress = *progress_rx.borrow_and_update();
            if last_stage != Some(progress.stage) {
                tracing::info!("Upload stage: {:?}", progress.stage);
                last_stage = Some(progress.stage);
            }
            if progress.stage == UploadStage::Uploading {
                let percent = progress.percent() / 10 * 10;
                if last_percent != Some(percent) {
                    tracing::info!("Uploaded {}%", percent);
                    last_percent = Some(percent);
                }
            }
        }
    });

    let cancel = interrupt_token();
    let request = UploadRequest {
        path: file,
        owner,
        metadata,
    };
    let receipt = state.uploader().upload(request, progress_tx, &cancel).await;
    let _ = reporter.await;
    let receipt = receipt?;

    println!("content id:  {}", receipt.content_id);
    println!("ipfs cid:    {}", receipt.ipfs_content_id);
    println!("liaison:     {}", receipt.liaison);
    println!("url:         {}", receipt.url);
    println!("size:        {} bytes", receipt.size_in_bytes);
    Ok(())
}
