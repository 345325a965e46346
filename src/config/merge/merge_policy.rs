//! Merge rules: built-in defaults sit underneath every file and environment source.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.store_path", ".skillsprint/store")?
        .set_default("scheduler.job_name", "enrich-roadmap")?
        .set_default("scheduler.max_hops", 15)?
        .set_default("scheduler.initial_hop_index", 1)?
        .set_default("search.fallback_suffix", "tutorial")
}
