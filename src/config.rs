//! Configuration System
//!
//! Layered configuration for storage, the model provider, resource search, the
//! continuation scheduler and logging. Sources are merged low to high: built-in
//! defaults, the global user file, workspace files, then `SKILLSPRINT__*` environment
//! variables.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

pub use sources::global_file::global_config_path;

/// Prefix for environment overrides, e.g. `SKILLSPRINT__SCHEDULER__MAX_HOPS=4`.
pub const ENV_PREFIX: &str = "SKILLSPRINT";
const ENV_SEPARATOR: &str = "__";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillsprintConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Record store directory, relative to the workspace root unless absolute.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".skillsprint/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

impl StorageConfig {
    pub fn resolve(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Ollama => "ollama",
        }
    }
}

/// Model provider used by the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderType,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL override (required for self-hosted endpoints)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider_type() -> ProviderType {
    ProviderType::OpenAI
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            model: default_model(),
            api_key: None,
            endpoint: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Results kept per kind (web, video)
    #[serde(default = "default_results_per_kind")]
    pub results_per_kind: usize,

    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,

    /// Appended to the term for the single retry after an empty web result
    #[serde(default = "default_fallback_suffix")]
    pub fallback_suffix: String,
}

fn default_results_per_kind() -> usize {
    3
}

fn default_search_timeout_ms() -> u64 {
    30_000
}

fn default_fallback_suffix() -> String {
    "tutorial".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            results_per_kind: default_results_per_kind(),
            timeout_ms: default_search_timeout_ms(),
            fallback_suffix: default_fallback_suffix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Name the enrichment job is registered and dispatched under.
    #[serde(default = "default_job_name")]
    pub job_name: String,

    /// Last hop allowed to dispatch no further continuation.
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,

    #[serde(default = "default_initial_hop_index")]
    pub initial_hop_index: u32,

    /// Wall-clock budget per hop; unset means a hop only yields on rate limits.
    #[serde(default)]
    pub hop_budget_ms: Option<u64>,

    /// Client-side deadline for each search call.
    #[serde(default = "default_scheduler_search_timeout_ms")]
    pub search_timeout_ms: Option<u64>,

    /// Relay continuations to `{dispatch_url}/jobs/{job_name}` instead of running
    /// them in-process.
    #[serde(default)]
    pub dispatch_url: Option<String>,
}

fn default_job_name() -> String {
    "enrich-roadmap".to_string()
}

fn default_max_hops() -> u32 {
    15
}

fn default_initial_hop_index() -> u32 {
    1
}

fn default_scheduler_search_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_name: default_job_name(),
            max_hops: default_max_hops(),
            initial_hop_index: default_initial_hop_index(),
            hop_budget_ms: None,
            search_timeout_ms: default_scheduler_search_timeout_ms(),
            dispatch_url: None,
        }
    }
}

/// A single configuration problem, tagged with the section it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub section: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn new(section: &'static str, message: impl Into<String>) -> Self {
        Self {
            section,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.section, self.message)
    }
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

impl SkillsprintConfig {
    /// Collect every problem rather than stopping at the first.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.storage.store_path.as_os_str().is_empty() {
            issues.push(ValidationIssue::new("storage", "store_path cannot be empty"));
        }

        if self.provider.model.trim().is_empty() {
            issues.push(ValidationIssue::new("provider", "model cannot be empty"));
        }
        if let Some(endpoint) = &self.provider.endpoint {
            if !is_url(endpoint) {
                issues.push(ValidationIssue::new(
                    "provider",
                    format!("endpoint must be an http(s) URL, got '{}'", endpoint),
                ));
            }
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            issues.push(ValidationIssue::new(
                "provider",
                "temperature must be between 0.0 and 2.0",
            ));
        }

        if let Some(endpoint) = &self.search.endpoint {
            if !is_url(endpoint) {
                issues.push(ValidationIssue::new(
                    "search",
                    format!("endpoint must be an http(s) URL, got '{}'", endpoint),
                ));
            }
        }
        if self.search.results_per_kind == 0 {
            issues.push(ValidationIssue::new(
                "search",
                "results_per_kind must be at least 1",
            ));
        }

        if self.scheduler.max_hops < 1 {
            issues.push(ValidationIssue::new("scheduler", "max_hops must be at least 1"));
        }
        if self.scheduler.initial_hop_index < 1 {
            issues.push(ValidationIssue::new(
                "scheduler",
                "initial_hop_index is 1-based",
            ));
        }
        if self.scheduler.initial_hop_index > self.scheduler.max_hops {
            issues.push(ValidationIssue::new(
                "scheduler",
                "initial_hop_index cannot exceed max_hops",
            ));
        }
        if self.scheduler.hop_budget_ms == Some(0) {
            issues.push(ValidationIssue::new(
                "scheduler",
                "hop_budget_ms must be positive when set",
            ));
        }
        if let Some(url) = &self.scheduler.dispatch_url {
            if !is_url(url) {
                issues.push(ValidationIssue::new(
                    "scheduler",
                    format!("dispatch_url must be an http(s) URL, got '{}'", url),
                ));
            }
        }
        if self.scheduler.job_name.trim().is_empty() {
            issues.push(ValidationIssue::new("scheduler", "job_name cannot be empty"));
        }

        issues
    }

    /// `validate` folded into a single `ConfigError`.
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        let issues = self.validate();
        if issues.is_empty() {
            return Ok(());
        }
        let lines: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
        Err(ApiError::ConfigError(format!(
            "Configuration validation failed:\n{}",
            lines.join("\n")
        )))
    }
}

/// Loads [`SkillsprintConfig`] from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(workspace_root: &Path) -> Result<SkillsprintConfig, ApiError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;
        let loaded: SkillsprintConfig = config.try_deserialize()?;
        debug!(
            workspace = %workspace_root.display(),
            provider = loaded.provider.provider_type.as_str(),
            "Configuration loaded"
        );
        Ok(loaded)
    }

    /// Load a single file on top of the defaults, ignoring every other source.
    pub fn load_from_file(path: &Path) -> Result<SkillsprintConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config: Config = merge::merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
