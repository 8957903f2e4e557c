use std::fs;

use vintage_config::{discover_config_path, load_for_dir, ConfigError, VintageConfig};

// Environment variables are process-global; keep every test that touches
// `VINTAGE_CONFIG_PATH` in this one function.
#[test]
fn discovery_order_and_loading() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    std::env::remove_var("VINTAGE_CONFIG_PATH");

    let (config, path) = load_for_dir(dir).unwrap();
    assert_eq!(config, VintageConfig::default());
    assert!(path.is_none());

    fs::write(dir.join(".vintage.toml"), "[pipeline]\nmin_releases = 5\n").unwrap();
    assert_eq!(discover_config_path(dir), Some(dir.join(".vintage.toml")));

    fs::write(dir.join("vintage.toml"), "[pipeline]\nmin_releases = 7\n").unwrap();
    let (config, path) = load_for_dir(dir).unwrap();
    assert_eq!(path, Some(dir.join("vintage.toml")));
    assert_eq!(config.pipeline.min_releases, 7);

    fs::write(dir.join("custom.toml"), "[detector]\nconcurrency = 1\n").unwrap();
    std::env::set_var("VINTAGE_CONFIG_PATH", "custom.toml");
    let (config, path) = load_for_dir(dir).unwrap();
    std::env::remove_var("VINTAGE_CONFIG_PATH");
    assert_eq!(path, Some(dir.join("custom.toml")));
    assert_eq!(config.detector.concurrency, Some(1));
}

#[test]
fn invalid_files_report_their_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("broken.toml");
    fs::write(&path, "[pipeline]\nmin_releases = \"many\"\n").unwrap();

    let err = VintageConfig::load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
    assert!(err.to_string().contains("broken.toml"), "{err}");

    let err = VintageConfig::load_from_path(tmp.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
