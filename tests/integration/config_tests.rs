use gallery_sync::config::{Config, ConfigError};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_file_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
images_dir = "/srv/gallery/images"
convert_small_opts = "-resize 200x150"

[archive]
enabled = true
access_token = "token"
interval_secs = 3600
"#,
    )
    .unwrap();

    let config: Config = Config::figment(Some(path.as_path())).extract().unwrap();

    assert_eq!(config.images_dir, PathBuf::from("/srv/gallery/images"));
    assert_eq!(config.profiles().small.params, vec!["-resize", "200x150"]);
    assert_eq!(config.medium_dir, PathBuf::from("medium"));
    assert_eq!(config.sync_interval(), Duration::from_secs(3600));
    assert_eq!(config.archive.dir, "gallery-backup");
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let config: Config = Config::figment(Some(dir.path().join("absent.toml").as_path()))
        .extract()
        .unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_wrong_type_is_a_load_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "transform_timeout_secs = \"soon\"\n").unwrap();

    let result = Config::load(Some(path.as_path()));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
fn test_same_variant_dirs_invalid() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "small_dir = \"thumbs\"\nmedium_dir = \"thumbs\"\n").unwrap();

    let config: Config = Config::figment(Some(path.as_path())).extract().unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}
