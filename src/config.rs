//! # Configuration Management
//!
//! Loads the relay's settings from layered sources:
//! - Default values (built into the code)
//! - An optional `config.toml` file
//! - Environment variables with the `APP_` prefix
//! - A handful of well-known deployment variables (`HOST`, `PORT`, ...)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Deployment variables: `HOST`, `PORT`, `PIPELINE_WS_URL`,
//!    `OPENROUTER_API_KEY`, `DATABASE_PATH`
//! 2. Prefixed variables: `APP_SERVER__PORT`, `APP_CACHE__LIST_TTL_SECS`, ...
//!    (double underscore between section and field, since field names
//!    contain single underscores)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// Each section maps to one collaborator that `main` builds at startup, so a
/// component only ever sees the slice of configuration it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub llm: LlmConfig,
    pub performance: PerformanceConfig,
}

/// Where the HTTP/WebSocket server listens.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any address (containers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// The upstream speech pipeline (ASR, translation, TTS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fixed WebSocket address every relay and push-to-talk call dials
    pub ws_url: String,
}

/// Persistent session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file; `:memory:` keeps everything in RAM
    pub database_path: String,
}

/// Longest TTL any cache tier may be configured with (one year).
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Cache-aside store sizing and TTL tiers.
///
/// ## TTL tiers:
/// - `list_ttl_secs`: the sessions list, invalidated on every create/update
/// - `session_ttl_secs`: single session reads
/// - `artifact_ttl_secs`: generated summaries, vocabulary and flashcards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_capacity: u64,
    pub list_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub artifact_ttl_secs: u64,
}

/// OpenRouter-compatible chat completion endpoint used for post-lesson
/// artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Upper bound on simultaneously open relays; further upgrades get a 503
    pub max_concurrent_sessions: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            list_ttl_secs: 15 * 60,
            session_ttl_secs: 60 * 60,
            artifact_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            pipeline: PipelineConfig {
                ws_url: "ws://localhost:8001/ws".to_string(),
            },
            storage: StorageConfig {
                database_path: "classroom.db".to_string(),
            },
            cache: CacheConfig::default(),
            llm: LlmConfig {
                api_key: String::new(),
                base_url: "https://openrouter.ai/api/v1".to_string(),
                model: "anthropic/claude-3.5-sonnet".to_string(),
                timeout_secs: 120,
            },
            performance: PerformanceConfig {
                max_concurrent_sessions: 100,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from every source in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__HOST=0.0.0.0`: Override server host
    /// - `APP_CACHE__SESSION_TTL_SECS=600`: Shorten the session tier
    /// - `PIPELINE_WS_URL=ws://pipeline:8001/ws`: Point at another pipeline
    /// - `PORT=3000`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Deployment platforms set these without the APP_ prefix
        let overrides = [
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("PIPELINE_WS_URL", "pipeline.ws_url"),
            ("OPENROUTER_API_KEY", "llm.api_key"),
            ("DATABASE_PATH", "storage.database_path"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = env::var(var) {
                settings = settings.set_override(key, value)?;
            }
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - The pipeline URL is a `ws://` or `wss://` address
    /// - The cache can hold at least one entry and every TTL tier is non-zero
    /// - TTL tiers are ordered list <= session <= artifact
    /// - No TTL tier exceeds [`MAX_CACHE_TTL_SECS`]
    /// - At least one concurrent session is allowed
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("Server port cannot be 0");
        }

        let url = self.pipeline.ws_url.trim();
        if url.is_empty() {
            bail!("Pipeline WebSocket URL cannot be empty");
        }
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            bail!("Pipeline URL must use ws:// or wss://, got {}", url);
        }

        if self.storage.database_path.trim().is_empty() {
            bail!("Database path cannot be empty");
        }

        let cache = &self.cache;
        if cache.max_capacity == 0 {
            bail!("Cache capacity must be greater than 0");
        }
        if cache.list_ttl_secs == 0 || cache.session_ttl_secs == 0 || cache.artifact_ttl_secs == 0 {
            bail!("Cache TTLs must be greater than 0");
        }
        if cache.list_ttl_secs > cache.session_ttl_secs || cache.session_ttl_secs > cache.artifact_ttl_secs {
            bail!("Cache TTLs must be ordered list <= session <= artifact");
        }
        if cache.artifact_ttl_secs > MAX_CACHE_TTL_SECS {
            bail!("Cache TTLs cannot exceed {} seconds", MAX_CACHE_TTL_SECS);
        }

        if self.llm.timeout_secs == 0 {
            bail!("LLM timeout must be greater than 0");
        }

        if self.performance.max_concurrent_sessions == 0 {
            bail!("Max concurrent sessions must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pipeline.ws_url, "ws://localhost:8001/ws");
        assert_eq!(config.cache.list_ttl_secs, 900);
        assert_eq!(config.cache.artifact_ttl_secs, 86_400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pipeline.ws_url = "http://localhost:8001/ws".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.cache.session_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_tiers_must_be_ordered() {
        let mut config = AppConfig::default();
        config.cache.list_ttl_secs = config.cache.artifact_ttl_secs + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ordered"));
    }

    #[test]
    fn test_oversized_ttl_is_rejected() {
        let mut config = AppConfig::default();
        config.cache.artifact_ttl_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exceed"));

        config.cache.artifact_ttl_secs = MAX_CACHE_TTL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secure_pipeline_url_is_accepted() {
        let mut config = AppConfig::default();
        config.pipeline.ws_url = "wss://pipeline.example.com/ws".to_string();
        assert!(config.validate().is_ok());
    }
}
