use clap::Parser;
use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
  MissingField(&'static str),
  Invalid(&'static str),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::MissingField(field) => {
        writeln!(f)?;
        writeln!(f, "Configuration Error: Missing required field")?;
        writeln!(f)?;

        match *field {
          "CONFIG_FILE" => {
            writeln!(f, "A YAML configuration file is required.")?;
            writeln!(f)?;
            writeln!(f, "Provide the path via:")?;
            writeln!(f, "  1. --config command line argument")?;
            writeln!(f, "  2. CONFIG_FILE environment variable")?;
          },
          "BOOTSTRAP_NODES" => {
            writeln!(f, "At least one bootstrap discovery node is required.")?;
            writeln!(f)?;
            writeln!(f, "List them under `bootstrapNodes` in the config file, or")?;
            writeln!(
              f,
              "point `bootstrapNodesEnv` at a variable holding a comma-separated list."
            )?;
          },
          "MEMBER_ID" => {
            writeln!(f, "Uploading requires the member id that owns the content.")?;
            writeln!(f)?;
            writeln!(f, "Provide it via:")?;
            writeln!(f, "  1. --member-id command line argument")?;
            writeln!(f, "  2. MEMBER_ID environment variable")?;
            writeln!(f, "  3. `memberId` in the config file")?;
          },
          _ => {
            writeln!(f, "Field: {}", field)?;
            writeln!(f)?;
            writeln!(f, "Please provide this required configuration parameter.")?;
          },
        }
      },
      ConfigError::Invalid(msg) => {
        writeln!(f)?;
        writeln!(f, "Configuration Error: Invalid value")?;
        writeln!(f)?;
        writeln!(f, "{}", msg)?;
        writeln!(f)?;
      },
    }

    writeln!(f, "Run with --help for more information.")
  }
}

pub trait ConfigValidator {
  fn validate(&self) -> impl std::future::Future<Output = Result<(), ConfigError>>;
}

/// Longest accepted endpoint freshness window, one week
pub const MAX_FRESHNESS_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Freshness window for a configured number of seconds, `None` when zero or above the maximum
pub fn freshness_window(seconds: u64) -> Option<chrono::Duration> {
  if seconds == 0 || seconds > MAX_FRESHNESS_SECONDS {
    return None;
  }
  i64::try_from(seconds)
    .ok()
    .and_then(chrono::Duration::try_seconds)
}

/// Trim whitespace and trailing slashes from a node or endpoint URL
pub fn normalize_endpoint(endpoint: &str) -> String {
  endpoint.trim().trim_end_matches('/').to_string()
}

/// Settings shared by every command that talks to storage providers
#[derive(Parser, Debug, Clone)]
pub struct ClientConfig {
  #[arg(
    long,
    env = "REQUEST_TIMEOUT",
    help = "Per-request HTTP timeout in seconds (overrides requestTimeout from the config file)"
  )]
  pub request_timeout: Option<u64>,

  #[arg(
    long,
    env = "FRESHNESS_SECONDS",
    help = "How long a resolved provider endpoint is reused before asking bootstrap nodes again"
  )]
  pub freshness_seconds: Option<u64>,
}

impl ConfigValidator for ClientConfig {
  async fn validate(&self) -> Result<(), ConfigError> {
    if self.request_timeout == Some(0) {
      return Err(ConfigError::Invalid("request timeout must be greater than 0"));
    }
    if let Some(seconds) = self.freshness_seconds {
      if freshness_window(seconds).is_none() {
        return Err(ConfigError::Invalid(
          "endpoint freshness must be between 1 and 604800 seconds",
        ));
      }
    }
    Ok(())
  }
}

#[derive(Parser, Debug, Clone)]
pub struct ServeConfig {
  #[arg(long, env = "PORT", help = "HTTP gateway port (overrides port from the config file)")]
  pub port: Option<u16>,
}

impl ConfigValidator for ServeConfig {
  async fn validate(&self) -> Result<(), ConfigError> {
    if self.port == Some(0) {
      return Err(ConfigError::Invalid("port must be greater than 0"));
    }
    Ok(())
  }
}
