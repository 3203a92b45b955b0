//! Application configuration for the mediator.
//!
//! Bound from YAML files and environment variables into a single `Config`
//! struct: per-request-type limiter and cache rules, named resilience
//! pipelines, and the remote endpoint.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::limiter::RateLimitRule;
use crate::remote::AuditHeaders;
use crate::resilience::{BackoffShape, PipelineRegistry, ResiliencePipeline, RetryPolicy};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "INTERPLAY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "INTERPLAY";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "INTERPLAY_LOG";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cross-process requester endpoint and audit metadata.
    pub remote: RemoteConfig,
    /// Named resilience pipelines and the default name.
    pub resilience: ResilienceConfig,
    /// Limiter rules keyed by request type short name.
    pub limiter: HashMap<String, RateLimitRule>,
    /// Cache rules keyed by request type short name.
    pub cache: HashMap<String, CacheRule>,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `INTERPLAY_CONFIG` environment variable (if set)
    /// 4. Environment variables with `INTERPLAY` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new("config", FileFormat::Yaml).required(false))
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }
}

/// Cross-process requester configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the peer process.
    pub base_url: String,
    /// Restricted namespace for wire type names.
    pub contract_namespace: String,
    /// Audit metadata attached to outbound calls when present.
    pub audit: AuditHeaders,
}

/// Named resilience pipelines.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub default_pipeline: String,
    pub pipelines: HashMap<String, PipelineConfig>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        let mut pipelines = HashMap::new();
        pipelines.insert("default".to_string(), PipelineConfig::default());
        Self {
            default_pipeline: "default".to_string(),
            pipelines,
        }
    }
}

impl ResilienceConfig {
    /// Build the pipeline registry from the configured pipelines.
    pub fn build_registry(&self) -> PipelineRegistry {
        let mut registry = PipelineRegistry::new(self.default_pipeline.clone());
        for (name, pipeline) in &self.pipelines {
            registry = registry.with_pipeline(ResiliencePipeline::new(
                name.clone(),
                Duration::from_secs(pipeline.timeout_seconds),
                RetryPolicy {
                    max_attempts: pipeline.retry.max_attempts,
                    delay: Duration::from_millis(pipeline.retry.delay_milliseconds),
                    backoff: pipeline.retry.backoff,
                    use_jitter: pipeline.retry.use_jitter,
                },
            ));
        }
        registry
    }
}

/// One named pipeline: overall timeout wrapping retry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub timeout_seconds: u64,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry component of a pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_milliseconds: u64,
    pub use_jitter: bool,
    pub backoff: BackoffShape,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_milliseconds: 500,
            use_jitter: true,
            backoff: BackoffShape::Exponential,
        }
    }
}

/// Cache rule for one request type.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CacheRule {
    /// Default absolute expiration relative to now, in seconds.
    pub default_expiration_secs: u64,
}

impl Default for CacheRule {
    fn default() -> Self {
        Self {
            default_expiration_secs: 300,
        }
    }
}

impl CacheRule {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_expiration_secs)
    }
}
