use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

use crate::sources::elexon::RetryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "ingestion-config.toml";
pub const DEFAULT_BASE_URL: &str = "https://data.elexon.co.uk/bmrs/api/v1/generation/actual/per-type/wind-and-solar";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://windsolar.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub rate_limit_delay_ms: u64,
    pub max_chunk_days: u32,
    pub max_attempts: u32,
    pub backoff_multiplier_ms: u64,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 60,
            rate_limit_delay_ms: 1000,
            max_chunk_days: 6,
            max_attempts: 3,
            backoff_multiplier_ms: 1000,
            backoff_min_ms: 4000,
            backoff_max_ms: 10_000,
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            multiplier: Duration::from_millis(self.backoff_multiplier_ms),
            min_delay: Duration::from_millis(self.backoff_min_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Fetch requests spanning more days than this run in the background.
    pub background_threshold_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            background_threshold_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Load from `$INGESTION_CONFIG`, or `ingestion-config.toml` in the working
    /// directory. An explicitly named file must exist; the default one may be
    /// absent, in which case built-in defaults apply.
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        match env::var("INGESTION_CONFIG") {
            Ok(path) => Self::from_file(&path),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file '{path}': {e}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        if cfg.upstream.max_chunk_days == 0 || cfg.upstream.max_chunk_days > 7 {
            anyhow::bail!(
                "upstream.max_chunk_days must be between 1 and 7, got {}",
                cfg.upstream.max_chunk_days
            );
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.upstream.max_chunk_days, 6);
        assert_eq!(cfg.upstream.request_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.upstream.rate_limit_delay(), Duration::from_secs(1));
        assert_eq!(cfg.server.background_threshold_days, 30);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn partial_sections_override_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [database]
            url = "sqlite::memory:"

            [upstream]
            rate_limit_delay_ms = 0
            max_attempts = 5

            [metrics]
            bind_addr = "127.0.0.1:9100"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.database.url, "sqlite::memory:");
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.upstream.rate_limit_delay(), Duration::ZERO);
        assert_eq!(cfg.upstream.retry_policy().max_attempts, 5);
        assert_eq!(cfg.upstream.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.metrics.unwrap().bind_addr, "127.0.0.1:9100");
    }

    #[test]
    fn example_file_parses() {
        let cfg = AppConfig::from_toml(include_str!("../ingestion-config.example.toml")).unwrap();
        assert_eq!(cfg.upstream.retry_policy(), RetryPolicy::default());
        assert_eq!(cfg.server.bind_addr, "0.0.0.0:8000");
    }

    #[test]
    fn chunk_size_above_upstream_limit_is_rejected() {
        let err = AppConfig::from_toml("[upstream]\nmax_chunk_days = 8\n").unwrap_err();
        assert!(err.to_string().contains("max_chunk_days"));
    }
}
