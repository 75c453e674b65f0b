//! Configuration types for manuscript-export

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Top-level configuration
///
/// All fields have sensible defaults; `Config::default()` yields a working
/// setup pointed at a local upstream.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Upstream content service settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Export pipeline behavior
    #[serde(default)]
    pub export: ExportConfig,

    /// Progress push-channel settings
    #[serde(default)]
    pub progress: ProgressConfig,

    /// API server settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Validate the configuration, returning the first invalid setting found
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.upstream.base_url).is_err() {
            return Err(Error::Config {
                message: format!("invalid upstream base URL: {}", self.upstream.base_url),
                key: Some("upstream.base_url".to_string()),
            });
        }

        if self.upstream.metadata_timeout.is_zero() || self.upstream.file_timeout.is_zero() {
            return Err(Error::Config {
                message: "upstream timeouts must be non-zero".to_string(),
                key: Some("upstream.metadata_timeout".to_string()),
            });
        }

        if self.progress.heartbeat_interval.is_zero() {
            return Err(Error::Config {
                message: "heartbeat interval must be non-zero".to_string(),
                key: Some("progress.heartbeat_interval".to_string()),
            });
        }

        if self.progress.channel_capacity == 0 {
            return Err(Error::Config {
                message: "channel capacity must be at least 1".to_string(),
                key: Some("progress.channel_capacity".to_string()),
            });
        }

        Ok(())
    }
}

/// Upstream content service configuration
///
/// Every call carries its own timeout, independent of any caller-supplied
/// cancellation; if both fire, cancellation wins.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpstreamConfig {
    /// Base URL of the manuscript repository API (default: "http://localhost:4010")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for metadata (file list) requests (default: 15 seconds)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    pub metadata_timeout: Duration,

    /// Timeout for file byte requests (default: 30 seconds)
    #[serde(default = "default_file_timeout", with = "duration_serde")]
    pub file_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            metadata_timeout: default_metadata_timeout(),
            file_timeout: default_file_timeout(),
        }
    }
}

/// Export pipeline configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExportConfig {
    /// Fall back to the degraded fixed file set when the metadata fetch
    /// fails outright, instead of failing the whole job (default: true)
    #[serde(default = "default_true")]
    pub mock_fallback: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mock_fallback: true,
        }
    }
}

/// Progress push-channel configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProgressConfig {
    /// Interval between heartbeat payloads on idle channels (default: 30 seconds)
    #[serde(default = "default_heartbeat_interval", with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Delay between a terminal event and channel teardown, so the final
    /// event is observed before the channel disappears (default: 5 seconds)
    #[serde(default = "default_teardown_grace", with = "duration_serde")]
    pub teardown_grace: Duration,

    /// Per-registration event buffer size (default: 64)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            teardown_grace: default_teardown_grace(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Server configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerConfig {
    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Bind address for the API server (default: "127.0.0.1:6780")
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// API key required in the X-Api-Key header (None = no authentication)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS middleware (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins; "*" allows any (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Serve interactive Swagger UI at /swagger-ui (default: false)
    #[serde(default)]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: false,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:4010".to_string()
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_file_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_teardown_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_channel_capacity() -> usize {
    64
}

fn default_bind_address() -> SocketAddr {
    "127.0.0.1:6780"
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 6780)))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (seconds as integer)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
