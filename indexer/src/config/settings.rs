//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Solana RPC configuration.
    pub rpc: RpcSettings,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// Ingestion and verification pipeline configuration.
    pub indexer: IndexerSettings,
    /// URI-metadata worker configuration.
    pub metadata: MetadataSettings,
    /// API gating configuration (the API itself is out of scope).
    pub api: ApiSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Metrics configuration.
    pub metrics: MetricsSettings,
    /// On-chain program identity.
    pub program: ProgramSettings,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with `INDEXER_` prefix
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("rpc.url", "http://localhost:8899")?
            .set_default("rpc.max_retries", 3)?
            .set_default("rpc.retry_delay_ms", 1000)?
            .set_default("rpc.request_timeout_ms", 30000)?
            .set_default("database.url", "postgres://localhost/agent_feedback")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_ms", 5000)?
            .set_default("database.idle_timeout_ms", 600_000)?
            .set_default("indexer.db_mode", "local")?
            .set_default("indexer.api_mode", "rest")?
            .set_default("indexer.indexer_mode", "polling")?
            .set_default("indexer.polling_interval_ms", 1000)?
            .set_default("indexer.batch_size", 1000)?
            .set_default("indexer.verify_interval_ms", 60_000)?
            .set_default("indexer.verify_batch_size", 200)?
            .set_default("indexer.verify_safety_margin_slots", 32)?
            .set_default("indexer.verify_max_retries", 3)?
            .set_default("indexer.verification_enabled", true)?
            .set_default("metadata.metadata_index_mode", "standard")?
            .set_default("metadata.metadata_timeout_ms", 30_000)?
            .set_default("metadata.metadata_max_bytes", 1_048_576)?
            .set_default("metadata.metadata_max_value_bytes", 65_536)?
            .set_default("metadata.allow_insecure_uri", false)?
            .set_default("api.stats_cache_ttl_ms", 10_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("logging.file_path", Option::<String>::None)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.host", "0.0.0.0")?
            .set_default("metrics.port", 9090)?
            // Program identity - MUST be set in production config
            .set_default(
                "program.program_id",
                "11111111111111111111111111111111",
            )?
            // Load default configuration file
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            // Load environment-specific file
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            // Override with environment variables (INDEXER_ prefix)
            .add_source(
                Environment::with_prefix("INDEXER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.rpc.url.is_empty() {
            errors.push("rpc.url cannot be empty".into());
        }

        if self.database.url.is_empty() {
            errors.push("database.url cannot be empty".into());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be non-zero".into());
        }
        if self.database.min_connections > self.database.max_connections {
            errors.push("database.min_connections cannot exceed max_connections".into());
        }

        if !matches!(self.indexer.db_mode.as_str(), "local" | "supabase") {
            errors.push("indexer.db_mode must be 'local' or 'supabase'".into());
        }
        if !matches!(self.indexer.api_mode.as_str(), "rest" | "graphql" | "both") {
            errors.push("indexer.api_mode must be 'rest', 'graphql', or 'both'".into());
        }
        if !matches!(
            self.indexer.indexer_mode.as_str(),
            "polling" | "websocket" | "auto"
        ) {
            errors.push("indexer.indexer_mode must be 'polling', 'websocket', or 'auto'".into());
        }
        if self.indexer.batch_size == 0 {
            errors.push("indexer.batch_size must be non-zero".into());
        }
        if self.indexer.verify_batch_size == 0 {
            errors.push("indexer.verify_batch_size must be non-zero".into());
        }

        if !matches!(
            self.metadata.metadata_index_mode.as_str(),
            "off" | "standard" | "full"
        ) {
            errors
                .push("metadata.metadata_index_mode must be 'off', 'standard', or 'full'".into());
        }
        if self.metadata.metadata_max_value_bytes > self.metadata.metadata_max_bytes {
            errors.push(
                "metadata.metadata_max_value_bytes cannot exceed metadata.metadata_max_bytes"
                    .into(),
            );
        }

        if self.program.program_id.is_empty() {
            errors.push("program.program_id cannot be empty".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Solana RPC configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcSettings {
    /// HTTP JSON-RPC endpoint URL.
    pub url: String,
    /// Maximum retry attempts for failed requests.
    pub max_retries: u32,
    /// Base delay between retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl RpcSettings {
    /// Get the retry delay as a `Duration`.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum connections in the pool.
    pub max_connections: u32,
    /// Minimum connections to maintain.
    pub min_connections: u32,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Idle connection timeout in milliseconds.
    pub idle_timeout_ms: u64,
}

impl DatabaseSettings {
    /// Get the connection timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get the idle timeout as a `Duration`.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Ingestion and verification pipeline configuration.
///
/// This is the closed configuration set: no fields beyond these are
/// recognized by the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerSettings {
    /// `"local"` (single-row writes) or `"supabase"` (pooled batched writes).
    pub db_mode: String,
    /// `"rest"`, `"graphql"`, or `"both"` — gates API initialization only.
    pub api_mode: String,
    /// `"polling"`, `"websocket"`, or `"auto"`.
    pub indexer_mode: String,
    /// Delay between live-tail polling ticks, in milliseconds.
    pub polling_interval_ms: u64,
    /// Maximum signatures processed per ingestion batch.
    pub batch_size: u64,
    /// Delay between verifier cycles, in milliseconds.
    pub verify_interval_ms: u64,
    /// Maximum agents re-verified per verifier cycle.
    pub verify_batch_size: u64,
    /// Slots subtracted from head to compute the finalized cutoff.
    pub verify_safety_margin_slots: u64,
    /// Maximum existence-probe retries before an agent is skipped for the cycle.
    pub verify_max_retries: u32,
    /// Whether the verifier task runs at all.
    pub verification_enabled: bool,
}

impl IndexerSettings {
    /// Get the polling interval as a `Duration`.
    #[must_use]
    pub const fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Get the verify interval as a `Duration`.
    #[must_use]
    pub const fn verify_interval(&self) -> Duration {
        Duration::from_millis(self.verify_interval_ms)
    }
}

/// URI-metadata worker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataSettings {
    /// `"off"`, `"standard"`, or `"full"`.
    pub metadata_index_mode: String,
    /// Per-fetch timeout in milliseconds.
    pub metadata_timeout_ms: u64,
    /// Maximum response body size accepted, in bytes.
    pub metadata_max_bytes: usize,
    /// Maximum size of an individual metadata value stored, in bytes.
    pub metadata_max_value_bytes: usize,
    /// Whether `http://` URIs are accepted (otherwise only `https://`/`ipfs://`).
    pub allow_insecure_uri: bool,
}

impl MetadataSettings {
    /// Get the fetch timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    /// Whether the worker is enabled at all.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.metadata_index_mode != "off"
    }
}

/// API gating configuration. The API itself is out of scope; these values
/// exist so the ambient config surface matches the closed set and so a
/// future API layer can read them without a schema change.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// TTL for cached aggregate stats, in milliseconds.
    pub stats_cache_ttl_ms: u64,
}

impl ApiSettings {
    /// Get the stats cache TTL as a `Duration`.
    #[must_use]
    pub const fn stats_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.stats_cache_ttl_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
    /// Optional file path for log output.
    pub file_path: Option<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Host to bind metrics server to.
    pub host: String,
    /// Port for metrics server.
    pub port: u16,
}

impl MetricsSettings {
    /// Get the metrics socket address string.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// On-chain program identity used for PDA derivation and signature
/// discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSettings {
    /// Base58 program id.
    pub program_id: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn rpc_durations() {
        let rpc = RpcSettings {
            url: "http://localhost:8899".into(),
            max_retries: 3,
            retry_delay_ms: 500,
            request_timeout_ms: 30000,
        };

        assert_eq!(rpc.retry_delay(), Duration::from_millis(500));
        assert_eq!(rpc.request_timeout(), Duration::from_millis(30000));
    }

    #[test]
    fn metadata_enabled_reflects_mode() {
        let mut metadata = MetadataSettings {
            metadata_index_mode: "off".into(),
            metadata_timeout_ms: 30_000,
            metadata_max_bytes: 1_048_576,
            metadata_max_value_bytes: 65_536,
            allow_insecure_uri: false,
        };
        assert!(!metadata.enabled());
        metadata.metadata_index_mode = "standard".into();
        assert!(metadata.enabled());
    }

    #[test]
    fn validation_catches_zero_connections() {
        let mut settings = create_valid_settings();
        settings.database.max_connections = 0;

        let result = settings.validate();
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("max_connections")));
    }

    #[test]
    fn validation_catches_min_exceeds_max() {
        let mut settings = create_valid_settings();
        settings.database.min_connections = 20;
        settings.database.max_connections = 10;

        let result = settings.validate();
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("min_connections")));
    }

    #[test]
    fn validation_rejects_unknown_db_mode() {
        let mut settings = create_valid_settings();
        settings.indexer.db_mode = "turbo".into();

        let result = settings.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().iter().any(|e| e.contains("db_mode")));
    }

    #[test]
    fn validation_rejects_value_bytes_exceeding_max_bytes() {
        let mut settings = create_valid_settings();
        settings.metadata.metadata_max_value_bytes = settings.metadata.metadata_max_bytes + 1;

        let result = settings.validate();
        assert!(result.is_err());
    }

    fn create_valid_settings() -> Settings {
        Settings {
            rpc: RpcSettings {
                url: "http://localhost:8899".into(),
                max_retries: 3,
                retry_delay_ms: 1000,
                request_timeout_ms: 30000,
            },
            database: DatabaseSettings {
                url: "postgres://localhost/test".into(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_ms: 5000,
                idle_timeout_ms: 600_000,
            },
            indexer: IndexerSettings {
                db_mode: "local".into(),
                api_mode: "rest".into(),
                indexer_mode: "polling".into(),
                polling_interval_ms: 1000,
                batch_size: 1000,
                verify_interval_ms: 60_000,
                verify_batch_size: 200,
                verify_safety_margin_slots: 32,
                verify_max_retries: 3,
                verification_enabled: true,
            },
            metadata: MetadataSettings {
                metadata_index_mode: "standard".into(),
                metadata_timeout_ms: 30_000,
                metadata_max_bytes: 1_048_576,
                metadata_max_value_bytes: 65_536,
                allow_insecure_uri: false,
            },
            api: ApiSettings {
                stats_cache_ttl_ms: 10_000,
            },
            logging: LoggingSettings {
                level: "info".into(),
                format: "json".into(),
                file_path: None,
            },
            metrics: MetricsSettings {
                enabled: true,
                host: "0.0.0.0".into(),
                port: 9090,
            },
            program: ProgramSettings {
                program_id: "11111111111111111111111111111111".into(),
            },
        }
    }
}
