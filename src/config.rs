/// Configuration management for the Kejmiltube client
use crate::error::{TubeError, TubeResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Namespaced key the signed-in profile is persisted under
pub const SESSION_STORAGE_KEY: &str = "kejmiltube_user";

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub engagement: EngagementConfig,
    pub logging: LoggingConfig,
}

/// Site-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Public base URL used when building share links
    pub site_url: String,
    pub version: String,
}

/// Which collaborator implementation backs the session and content layers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendConfig {
    Supabase {
        url: String,
        anon_key: String,
    },
    Memory {
        /// Pre-populate the catalogue with sample videos
        seed_sample_videos: bool,
    },
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Local persisted state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub session_key: String,
}

/// View counting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Send view increments at all
    pub view_tracking: bool,
    /// Public IP lookup endpoint, used only as a de-duplication hint
    pub ip_lookup_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl LoggingConfig {
    /// Default `EnvFilter` directive for the crate; `RUST_LOG` overrides it
    pub fn directive(&self) -> String {
        format!("kejmiltube={}", self.level)
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> TubeResult<Self> {
        dotenv::dotenv().ok();

        let site_url = env::var("KEJMILTUBE_SITE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        let version = env::var("KEJMILTUBE_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let backend_kind = env::var("KEJMILTUBE_BACKEND").unwrap_or_else(|_| {
            if env::var("SUPABASE_URL").is_ok() {
                "supabase".to_string()
            } else {
                "memory".to_string()
            }
        });

        let backend = match backend_kind.to_lowercase().as_str() {
            "supabase" => BackendConfig::Supabase {
                url: env::var("SUPABASE_URL")
                    .map_err(|_| TubeError::Config("SUPABASE_URL required".to_string()))?,
                anon_key: env::var("SUPABASE_ANON_KEY")
                    .map_err(|_| TubeError::Config("SUPABASE_ANON_KEY required".to_string()))?,
            },
            "memory" | "mock" => BackendConfig::Memory {
                seed_sample_videos: env::var("KEJMILTUBE_SEED_SAMPLE_VIDEOS")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .unwrap_or(true),
            },
            other => {
                return Err(TubeError::Config(format!(
                    "Unknown backend '{}', expected 'supabase' or 'memory'",
                    other
                )))
            }
        };

        let timeout_secs = env::var("KEJMILTUBE_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| TubeError::Config("Invalid HTTP timeout".to_string()))?;
        let user_agent = env::var("KEJMILTUBE_USER_AGENT")
            .unwrap_or_else(|_| format!("Kejmiltube/{}", env!("CARGO_PKG_VERSION")));

        let data_directory: PathBuf = env::var("KEJMILTUBE_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();

        let view_tracking = env::var("KEJMILTUBE_VIEW_TRACKING")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let ip_lookup_url = env::var("KEJMILTUBE_IP_LOOKUP_URL")
            .unwrap_or_else(|_| "https://api.ipify.org?format=text".to_string());

        let log_level = env::var("KEJMILTUBE_LOG_LEVEL")
            .map(|level| level.trim().to_ascii_lowercase())
            .unwrap_or_else(|_| "info".to_string());

        Ok(ClientConfig {
            service: ServiceConfig { site_url, version },
            backend,
            http: HttpConfig {
                timeout_secs,
                user_agent,
            },
            storage: StorageConfig {
                data_directory,
                session_key: SESSION_STORAGE_KEY.to_string(),
            },
            engagement: EngagementConfig {
                view_tracking,
                ip_lookup_url,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// In-memory configuration rooted at a data directory, used by tests and demos
    pub fn memory(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            service: ServiceConfig {
                site_url: "http://localhost:8080".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            backend: BackendConfig::Memory {
                seed_sample_videos: false,
            },
            http: HttpConfig {
                timeout_secs: 10,
                user_agent: format!("Kejmiltube/{}", env!("CARGO_PKG_VERSION")),
            },
            storage: StorageConfig {
                data_directory: data_directory.into(),
                session_key: SESSION_STORAGE_KEY.to_string(),
            },
            engagement: EngagementConfig {
                view_tracking: true,
                ip_lookup_url: "https://api.ipify.org?format=text".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> TubeResult<()> {
        if let BackendConfig::Supabase { url, anon_key } = &self.backend {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(TubeError::Config(
                    "SUPABASE_URL must be an http(s) URL".to_string(),
                ));
            }
            if anon_key.trim().is_empty() {
                return Err(TubeError::Config("SUPABASE_ANON_KEY cannot be empty".to_string()));
            }
        }

        if self.http.timeout_secs == 0 {
            return Err(TubeError::Config("HTTP timeout must be positive".to_string()));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(TubeError::Config(format!(
                "Log level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        if self.storage.session_key.is_empty() {
            return Err(TubeError::Config("Session storage key cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Share link for a video page
    pub fn video_link(&self, video_id: &str) -> String {
        format!("{}/video/{}", self.service.site_url.trim_end_matches('/'), video_id)
    }
}
