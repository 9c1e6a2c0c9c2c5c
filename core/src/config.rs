//! Configuration management for Vario
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Builder overrides (CLI flags)
//! 2. Environment variables (`VARIO_EXECUTOR__MAX_STEPS`, ...)
//! 3. Config file (`vario.toml` in the working directory, or `VARIO_CONFIG_PATH`)
//! 4. Built-in defaults
//!
//! # Example Config File (vario.toml)
//!
//! ```toml
//! [expression]
//! allow_globals = false
//! max_steps = 10000
//! timeout_ms = 100
//!
//! [executor]
//! timeout_ms = 5000
//! max_steps = 10000
//!
//! [pool]
//! loop_context_capacity = 10
//!
//! [log]
//! filter = "info,vario::action=debug"
//! ```
//!
//! # Environment Variables
//!
//! Every value can be set with the `VARIO_` prefix and `__` between section
//! and key, e.g. `VARIO_EXPRESSION__TIMEOUT_MS=250`. A `.env` file in the
//! working directory is loaded first.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::expression::ExpressionOptions;
use crate::runtime::{ContextOptions, LoopContextPool};
use crate::vm::ExecuteOptions;

const ENV_PREFIX: &str = "VARIO";
const DEFAULT_CONFIG_FILE: &str = "vario.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub expression: ExpressionConfig,
    pub executor: ExecutorConfig,
    pub pool: PoolConfig,
    pub log: LogConfig,
}

/// Limits for a single expression evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    pub allow_globals: bool,
    pub max_steps: usize,
    pub timeout_ms: u64,
    pub max_nesting_depth: usize,
    pub cache_results: bool,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        let defaults = ExpressionOptions::default();
        Self {
            allow_globals: defaults.allow_globals,
            max_steps: defaults.max_steps,
            timeout_ms: defaults.timeout_ms,
            max_nesting_depth: defaults.max_nesting_depth,
            cache_results: defaults.cache_results,
        }
    }
}

/// Limits for one `execute` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub timeout_ms: u64,
    pub max_steps: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_steps: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub loop_context_capacity: usize,
    pub path_cache_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            loop_context_capacity: LoopContextPool::DEFAULT_CAPACITY,
            path_cache_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with full priority chain:
    /// overrides → env vars → config file → defaults
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// Load configuration from a specific file, without env overlays
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        Ok(config)
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values that would make every evaluation or execution fail
    pub fn validate(&self) -> Result<()> {
        if self.expression.max_steps == 0 {
            anyhow::bail!("expression.max_steps must be greater than 0");
        }
        if self.expression.max_nesting_depth == 0 {
            anyhow::bail!("expression.max_nesting_depth must be greater than 0");
        }
        if self.executor.max_steps == 0 {
            anyhow::bail!("executor.max_steps must be greater than 0");
        }
        if self.executor.timeout_ms == 0 {
            anyhow::bail!("executor.timeout_ms must be greater than 0");
        }
        if self.pool.path_cache_capacity == 0 {
            anyhow::bail!("pool.path_cache_capacity must be greater than 0");
        }
        Ok(())
    }

    pub fn expression_options(&self) -> ExpressionOptions {
        ExpressionOptions {
            allow_globals: self.expression.allow_globals,
            max_steps: self.expression.max_steps,
            timeout_ms: self.expression.timeout_ms,
            max_nesting_depth: self.expression.max_nesting_depth,
            cache_results: self.expression.cache_results,
        }
    }

    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            timeout: Duration::from_millis(self.executor.timeout_ms),
            max_steps: self.executor.max_steps,
        }
    }

    /// Context options with these limits and no host hooks
    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            expression: self.expression_options(),
            loop_pool_capacity: self.pool.loop_context_capacity,
            path_cache_capacity: self.pool.path_cache_capacity,
            ..ContextOptions::default()
        }
    }
}

/// Builder for constructing Config with optional overrides
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
    allow_globals: Option<bool>,
    expression_max_steps: Option<usize>,
    expression_timeout_ms: Option<u64>,
    executor_timeout_ms: Option<u64>,
    executor_max_steps: Option<usize>,
    log_filter: Option<String>,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Ignore `.env`, `VARIO_*` variables and the default file lookup
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.skip_env = skip;
        self
    }

    pub fn allow_globals(mut self, allow: Option<bool>) -> Self {
        self.allow_globals = allow;
        self
    }

    pub fn expression_max_steps(mut self, max: Option<usize>) -> Self {
        self.expression_max_steps = max;
        self
    }

    pub fn expression_timeout_ms(mut self, timeout: Option<u64>) -> Self {
        self.expression_timeout_ms = timeout;
        self
    }

    pub fn executor_timeout_ms(mut self, timeout: Option<u64>) -> Self {
        self.executor_timeout_ms = timeout;
        self
    }

    pub fn executor_max_steps(mut self, max: Option<usize>) -> Self {
        self.executor_max_steps = max;
        self
    }

    pub fn log_filter(mut self, filter: Option<String>) -> Self {
        self.log_filter = filter;
        self
    }

    /// Build the final config by applying priority chain
    pub fn build(self) -> Result<Config> {
        if !self.skip_env {
            // Load .env file if present, so its values feed the env layer
            let _ = dotenvy::dotenv();
        }

        let defaults = ::config::Config::try_from(&Config::default())
            .context("Failed to serialize default configuration")?;
        let mut layers = ::config::Config::builder().add_source(defaults);

        if let Some(path) = self.resolve_config_path()? {
            layers = layers.add_source(
                ::config::File::from(path.as_path())
                    .format(::config::FileFormat::Toml)
                    .required(true),
            );
        }

        if !self.skip_env {
            layers = layers.add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let mut config: Config = layers
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Explicit path, then `VARIO_CONFIG_PATH`, then `./vario.toml` if it exists
    fn resolve_config_path(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.config_path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {:?}", path);
            }
            return Ok(Some(path.clone()));
        }
        if self.skip_env {
            return Ok(None);
        }
        if let Ok(path_str) = env::var("VARIO_CONFIG_PATH") {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                anyhow::bail!("Config file not found: {:?}", path);
            }
            return Ok(Some(path));
        }
        let project_config = PathBuf::from(DEFAULT_CONFIG_FILE);
        Ok(project_config.exists().then_some(project_config))
    }

    /// Apply builder overrides (highest priority)
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(allow) = self.allow_globals {
            config.expression.allow_globals = allow;
        }
        if let Some(max) = self.expression_max_steps {
            config.expression.max_steps = max;
        }
        if let Some(timeout) = self.expression_timeout_ms {
            config.expression.timeout_ms = timeout;
        }
        if let Some(timeout) = self.executor_timeout_ms {
            config.executor.timeout_ms = timeout;
        }
        if let Some(max) = self.executor_max_steps {
            config.executor.max_steps = max;
        }
        if let Some(filter) = &self.log_filter {
            config.log.filter = filter.clone();
        }
    }
}
