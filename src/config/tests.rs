use serial_test::serial;
use tempfile::TempDir;

use super::*;

fn valid_config(base_dir: &Path) -> Config {
    Config {
        provider: ProviderConfig {
            api_key: "sk-test".to_string(),
            ..ProviderConfig::default()
        },
        seeding: SeedingConfig::default(),
        base_dir: base_dir.to_path_buf(),
    }
}

#[test]
fn default_provider_config_points_at_openai() {
    let provider = ProviderConfig::default();
    assert_eq!(provider.base_url, "https://api.openai.com/v1");
    assert_eq!(provider.model, "text-embedding-3-small");
    assert_eq!(provider.batch_size, 32);
    assert_eq!(provider.dimensions, None);
}

#[test]
fn missing_api_key_fails_validation() {
    let provider = ProviderConfig::default();
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::MissingApiKey)
    ));
}

#[test]
fn empty_model_fails_validation() {
    let provider = ProviderConfig {
        api_key: "sk-test".to_string(),
        model: "  ".to_string(),
        ..ProviderConfig::default()
    };
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::InvalidModel(_))
    ));
}

#[test]
fn batch_size_bounds() {
    let mut provider = ProviderConfig {
        api_key: "sk-test".to_string(),
        ..ProviderConfig::default()
    };

    provider.batch_size = 0;
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::InvalidBatchSize(0))
    ));

    provider.batch_size = 1001;
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::InvalidBatchSize(1001))
    ));

    provider.batch_size = 1;
    assert!(provider.validate().is_ok());
}

#[test]
fn embedding_dimension_bounds() {
    let mut provider = ProviderConfig {
        api_key: "sk-test".to_string(),
        ..ProviderConfig::default()
    };

    provider.dimensions = Some(8);
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(8))
    ));

    provider.dimensions = Some(1536);
    assert!(provider.validate().is_ok());
}

#[test]
fn endpoint_joins_without_doubling_slashes() {
    let provider = ProviderConfig {
        base_url: "https://api.openai.com/v1/".to_string(),
        ..ProviderConfig::default()
    };
    let endpoint = provider.endpoint().expect("endpoint parses");
    assert_eq!(endpoint.as_str(), "https://api.openai.com/v1/embeddings");
}

#[test]
#[serial]
fn load_missing_file_uses_defaults_and_env_key() {
    let temp_dir = TempDir::new().expect("can create temp dir");

    // SAFETY: test is serialized, no other thread reads the environment
    unsafe {
        std::env::set_var(API_KEY_ENV, "sk-from-env");
    }
    let config = Config::load(temp_dir.path()).expect("config loads");
    unsafe {
        std::env::remove_var(API_KEY_ENV);
    }

    assert_eq!(config.provider.api_key, "sk-from-env");
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.database_path(), temp_dir.path().join("scripts.db"));
}

#[test]
#[serial]
fn load_fails_eagerly_without_credentials() {
    let temp_dir = TempDir::new().expect("can create temp dir");

    // SAFETY: test is serialized, no other thread reads the environment
    unsafe {
        std::env::remove_var(API_KEY_ENV);
    }
    let result = Config::load(temp_dir.path());
    assert!(result.is_err(), "missing API key must fail at load time");
}

#[test]
#[serial]
fn save_and_reload_round_trip() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut config = valid_config(temp_dir.path());
    config.provider.model = "text-embedding-3-large".to_string();
    config.provider.dimensions = Some(256);
    config.save().expect("config saves");

    // SAFETY: test is serialized, no other thread reads the environment
    unsafe {
        std::env::remove_var(API_KEY_ENV);
    }
    let reloaded = Config::load(temp_dir.path()).expect("config reloads");
    assert_eq!(reloaded, config);
}

#[test]
fn no_extensions_fails_validation() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut config = valid_config(temp_dir.path());
    config.seeding.extensions.clear();
    assert!(matches!(config.validate(), Err(ConfigError::NoExtensions)));
}
