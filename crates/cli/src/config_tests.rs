// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use tempfile::TempDir;

fn folder(name: &str, path: &str) -> FolderConfig {
    FolderConfig {
        name: name.to_string(),
        path: PathBuf::from(path),
        url: format!("ssh://host/{}", name),
        backend: "git".to_string(),
        identifier: "a".repeat(64),
        paused: false,
        storage_type: StorageType::Plain,
        announcements_url: None,
        fingerprint: None,
        commands: None,
    }
}

#[test]
fn test_missing_file_is_empty_config() {
    let temp = TempDir::new().unwrap();
    let config = Config::load(temp.path()).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.sync, SyncSettings::default());
}

#[test]
fn test_save_and_load_round_trip() {
    let temp = TempDir::new().unwrap();
    let mut config = Config {
        user: Some(UserConfig {
            name: "Alice".into(),
            email: "alice@example.org".into(),
        }),
        ..Config::default()
    };
    let mut docs = folder("docs", "/home/alice/Drift/docs");
    docs.backend = "external".into();
    docs.commands = Some(ExternalCommands {
        sync_up: Some("up.sh".into()),
        sync_down: Some("down.sh".into()),
        ..Default::default()
    });
    docs.announcements_url = Some("ws://relay:1986".into());
    config.add_folder(docs).unwrap();
    config.save(temp.path()).unwrap();

    let loaded = Config::load(temp.path()).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.user(), User::new("Alice", "alice@example.org"));
    assert!(!temp.path().join("config.toml.tmp").exists());
}

#[test]
fn test_documented_layout_parses() {
    let temp = TempDir::new().unwrap();
    let content = format!(
        r#"
[user]
name = "Alice"
email = "alice@example.org"

[sync]
poll_short_secs = 60

[[folder]]
name = "project-x"
path = "/home/alice/Drift/project-x"
url = "ssh://host/srv/project-x"
backend = "git"
identifier = "{}"
paused = true
storage_type = "large_files"
announcements_url = "ws://relay.example.org:1986"
"#,
        "b".repeat(64)
    );
    fs::write(temp.path().join(CONFIG_FILE_NAME), content).unwrap();

    let config = Config::load(temp.path()).unwrap();
    assert_eq!(config.sync.poll_short_secs, 60);
    assert_eq!(config.sync.poll_long_secs, 900);
    let f = config.folder("project-x").unwrap();
    assert!(f.paused);
    assert_eq!(f.storage_type, StorageType::LargeFiles);
    assert_eq!(f.backend_kind().unwrap(), BackendKind::Git);
}

#[test]
fn test_backend_defaults_to_git() {
    let temp = TempDir::new().unwrap();
    let content = format!(
        "[[folder]]\nname = \"a\"\npath = \"/a\"\nurl = \"ssh://h/a\"\nidentifier = \"{}\"\n",
        "c".repeat(64)
    );
    fs::write(temp.path().join(CONFIG_FILE_NAME), content).unwrap();
    let config = Config::load(temp.path()).unwrap();
    assert_eq!(config.folders[0].backend, "git");
}

#[test]
fn test_invalid_backend_is_reported() {
    let temp = TempDir::new().unwrap();
    let content = format!(
        "[[folder]]\nname = \"a\"\npath = \"/a\"\nurl = \"u\"\nbackend = \"cvs\"\nidentifier = \"{}\"\n",
        "c".repeat(64)
    );
    fs::write(temp.path().join(CONFIG_FILE_NAME), content).unwrap();
    let err = Config::load(temp.path()).unwrap_err();
    assert!(err.to_string().contains("unknown backend"));
}

#[test]
fn test_malformed_file_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(CONFIG_FILE_NAME), "[[folder]\nname=").unwrap();
    let err = Config::load(temp.path()).unwrap_err();
    assert!(err.to_string().contains("failed to parse config"));
}

#[test]
fn test_duplicate_names_and_paths_are_refused() {
    let mut config = Config::default();
    config.add_folder(folder("docs", "/d")).unwrap();
    assert!(matches!(
        config.add_folder(folder("docs", "/other")),
        Err(Error::FolderExists(_))
    ));
    assert!(matches!(
        config.add_folder(folder("docs2", "/d")),
        Err(Error::FolderExists(name)) if name == "docs"
    ));
}

#[test]
fn test_remove_folder() {
    let mut config = Config::default();
    config.add_folder(folder("docs", "/d")).unwrap();
    assert_eq!(config.remove_folder("docs").unwrap().name, "docs");
    assert!(matches!(
        config.remove_folder("docs"),
        Err(Error::FolderNotFound(_))
    ));
}

#[test]
fn test_blank_identifier_is_invalid() {
    let mut f = folder("docs", "/d");
    f.identifier = "  ".into();
    assert!(f.validate().is_err());
}

#[test]
fn test_timing_from_settings() {
    let settings = SyncSettings {
        poll_short_secs: 10,
        poll_long_secs: 5,
        tick_secs: 0,
        settle_samples: 0,
        ..SyncSettings::default()
    };
    let timing = settings.timing();
    assert_eq!(timing.poll_short, Duration::from_secs(10));
    assert_eq!(timing.poll_long, Duration::from_secs(10));
    assert_eq!(timing.tick, Duration::from_secs(1));
    assert_eq!(timing.settle_samples, 1);
    assert_eq!(settings.listener().heartbeat, Duration::from_secs(30));
}

#[test]
fn test_store_persists_pause_flag() {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.add_folder(folder("docs", "/d")).unwrap();
    config.save(temp.path()).unwrap();

    let store = ConfigStore::new(temp.path());
    store.set_paused("docs", true).unwrap();
    assert!(Config::load(temp.path()).unwrap().folder("docs").unwrap().paused);
    store.set_paused("docs", false).unwrap();
    assert!(!Config::load(temp.path()).unwrap().folder("docs").unwrap().paused);

    assert!(matches!(
        store.set_paused("missing", true),
        Err(Error::FolderNotFound(_))
    ));
}
