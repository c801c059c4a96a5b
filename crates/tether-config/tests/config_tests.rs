//! Configuration loading and precedence tests

use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tether_config::{BridgeConfig, ConfigError, ConfigLoader, LogFormat, CONFIG_FILE_NAME};

fn create_config_file(dir: &Path, content: &str) -> std::path::PathBuf {
    let config_path = dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, content).unwrap();
    config_path
}

fn loader_without_global(temp_dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_global_config_path(temp_dir.path().join("absent.toml"))
}

// ============================================================================
// Loading
// ============================================================================

#[test]
#[serial]
fn test_load_when_no_config_exists() {
    let temp_dir = TempDir::new().unwrap();

    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();

    assert!(!config.has_project_file());
    assert_eq!(config.bridge.runtime().call_depth_limit(), 200);
    assert_eq!(config.bridge.logging().format(), LogFormat::Pretty);
}

#[test]
#[serial]
fn test_load_from_nested_subdirectory_finds_root() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[conversion]
max_depth = 16
"#,
    );

    let nested = temp_dir.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();

    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(&nested).unwrap();

    assert_eq!(config.bridge.conversion().max_depth(), Some(16));
    assert_eq!(config.config_root(), Some(temp_dir.path()));
}

#[test]
fn test_missing_explicit_file_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.toml");

    let result = BridgeConfig::load_from_file(&missing);
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_invalid_toml_reports_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[runtime\ncall_depth_limit = ");

    match BridgeConfig::load_from_file(&path) {
        Err(ConfigError::TomlParseError { file, .. }) => assert_eq!(file, path),
        other => panic!("expected parse error, got {:?}", other),
    }
}

// ============================================================================
// Validation
// ============================================================================

#[rstest]
#[case("[runtime]\ncall_depth_limit = 0\n", "runtime.call_depth_limit")]
#[case("[conversion]\nmax_depth = 0\n", "conversion.max_depth")]
#[case("[logging]\nfilter = \"\"\n", "logging.filter")]
fn test_invalid_values_rejected(#[case] content: &str, #[case] expected_field: &str) {
    let result = BridgeConfig::parse(content, Path::new(CONFIG_FILE_NAME));
    match result {
        Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected_field),
        other => panic!("expected invalid value, got {:?}", other),
    }
}

#[rstest]
#[case("pretty", LogFormat::Pretty)]
#[case("compact", LogFormat::Compact)]
#[case("json", LogFormat::Json)]
fn test_log_format_in_toml(#[case] name: &str, #[case] expected: LogFormat) {
    let content = format!("[logging]\nformat = \"{}\"\n", name);
    let config = BridgeConfig::parse(&content, Path::new(CONFIG_FILE_NAME)).unwrap();
    assert_eq!(config.logging().format(), expected);
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
#[serial]
fn test_env_beats_project_beats_global() {
    let temp_dir = TempDir::new().unwrap();
    let global = temp_dir.path().join("global.toml");
    fs::write(
        &global,
        r#"
[pool]
max_idle = 1

[logging]
filter = "error"
format = "compact"
"#,
    )
    .unwrap();

    let project = temp_dir.path().join("project");
    fs::create_dir(&project).unwrap();
    create_config_file(
        &project,
        r#"
[pool]
max_idle = 4

[logging]
filter = "info"
"#,
    );

    std::env::set_var("TETHER_LOG", "tether_runtime=trace");
    std::env::set_var("TETHER_LOG_FORMAT", "json");

    let mut loader = ConfigLoader::with_global_config_path(&global);
    let result = loader.load_from_directory(&project);

    std::env::remove_var("TETHER_LOG");
    std::env::remove_var("TETHER_LOG_FORMAT");

    let config = result.unwrap();
    assert_eq!(config.bridge.pool().max_idle(), Some(4));
    assert_eq!(config.bridge.logging().filter(), "tether_runtime=trace");
    assert_eq!(config.bridge.logging().format(), LogFormat::Json);
}

#[test]
#[serial]
fn test_env_zero_call_depth_fails_validation() {
    let temp_dir = TempDir::new().unwrap();

    std::env::set_var("TETHER_CALL_DEPTH", "0");

    let mut loader = loader_without_global(&temp_dir);
    let result = loader.load_from_directory(temp_dir.path());

    std::env::remove_var("TETHER_CALL_DEPTH");

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_serialize_skips_unset_sections() {
    let config = BridgeConfig::default();
    let text = toml::to_string(&config).unwrap();
    assert_eq!(text.trim(), "");
}
