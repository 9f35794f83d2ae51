/// Configuration management for the media service
use crate::error::{MediaError, MediaResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL that presigned links are minted against
    pub public_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub object_store: ObjectStoreConfig,
}

/// Object store backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectStoreConfig {
    Disk { location: PathBuf },
    Memory,
}

/// Media pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub signing_secret: String,
    pub max_upload_bytes: usize,
    pub thumbnail_size: u32,
    pub presign_ttl_secs: u64,
    pub compensation_timeout_secs: u64,
}

impl MediaConfig {
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }

    pub fn compensation_timeout(&self) -> Duration {
        Duration::from_secs(self.compensation_timeout_secs)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> MediaResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("MEDIA_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("MEDIA_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| MediaError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("MEDIA_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let data_directory: PathBuf = env::var("MEDIA_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("MEDIA_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("media.sqlite"));

        let object_store = match env::var("MEDIA_OBJECT_STORE")
            .unwrap_or_else(|_| "disk".to_string())
            .to_lowercase()
            .as_str()
        {
            "disk" => ObjectStoreConfig::Disk {
                location: env::var("MEDIA_OBJECT_STORE_LOCATION")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data_directory.join("objects")),
            },
            "memory" => ObjectStoreConfig::Memory,
            other => {
                return Err(MediaError::Validation(format!(
                    "Unknown object store backend: {}",
                    other
                )))
            }
        };

        let signing_secret = env::var("MEDIA_SIGNING_SECRET")
            .map_err(|_| MediaError::Validation("Signing secret required".to_string()))?;
        let max_upload_bytes = env::var("MEDIA_MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "10485760".to_string())
            .parse()
            .unwrap_or(10 * 1024 * 1024);
        let thumbnail_size = env::var("MEDIA_THUMBNAIL_SIZE")
            .unwrap_or_else(|_| "256".to_string())
            .parse()
            .unwrap_or(256);
        let presign_ttl_secs = env::var("MEDIA_PRESIGN_TTL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);
        let compensation_timeout_secs = env::var("MEDIA_COMPENSATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "inventory_media=debug,tower_http=debug".to_string());
        let format = match env::var("MEDIA_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
                object_store,
            },
            media: MediaConfig {
                signing_secret,
                max_upload_bytes,
                thumbnail_size,
                presign_ttl_secs,
                compensation_timeout_secs,
            },
            logging: LoggingConfig { level, format },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> MediaResult<()> {
        if self.service.hostname.is_empty() {
            return Err(MediaError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.media.signing_secret.len() < 32 {
            return Err(MediaError::Validation(
                "Signing secret must be at least 32 characters".to_string(),
            ));
        }

        if self.media.max_upload_bytes == 0 {
            return Err(MediaError::Validation(
                "Upload limit must be greater than zero".to_string(),
            ));
        }

        if self.media.presign_ttl_secs == 0 {
            return Err(MediaError::Validation(
                "Presigned URL lifetime must be greater than zero".to_string(),
            ));
        }

        if self.media.compensation_timeout_secs == 0 {
            return Err(MediaError::Validation(
                "Compensation timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
