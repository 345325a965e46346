use skillsprint::config::{ConfigLoader, ProviderType, SkillsprintConfig};
use skillsprint::error::ApiError;
use tempfile::TempDir;

#[test]
fn explicit_file_layers_over_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("skillsprint.toml");
    std::fs::write(
        &path,
        r#"
[storage]
store_path = "/tmp/skillsprint-store"

[provider]
provider_type = "anthropic"
model = "claude-haiku"

[search]
endpoint = "https://search.example.com/v1"
results_per_kind = 5

[logging]
level = "debug"
format = "json"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config.provider.provider_type, ProviderType::Anthropic);
    assert_eq!(config.provider.model, "claude-haiku");
    assert_eq!(config.search.results_per_kind, 5);
    assert_eq!(config.search.fallback_suffix, "tutorial");
    assert_eq!(config.scheduler.max_hops, 15);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
    assert!(config.ensure_valid().is_ok());
}

#[test]
fn invalid_values_are_reported_not_silently_fixed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[scheduler]\nmax_hops = 0\ninitial_hop_index = 0\njob_name = \"\"\n").unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    let issues = config.validate();
    assert_eq!(issues.len(), 3);
    assert!(matches!(config.ensure_valid(), Err(ApiError::ConfigError(_))));
}

#[test]
fn defaults_are_valid() {
    assert!(SkillsprintConfig::default().validate().is_empty());
}
