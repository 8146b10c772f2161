// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use drift_core::Identifier;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// A sandbox with its own config and state directories. Folders use the
/// external backend so no sync tool has to be installed.
pub struct Sandbox {
    pub temp: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let sandbox = Sandbox {
            temp: TempDir::new().unwrap(),
        };
        fs::create_dir_all(sandbox.remotes()).unwrap();
        fs::create_dir_all(sandbox.folders()).unwrap();
        fs::create_dir_all(sandbox.config_dir()).unwrap();
        fs::write(
            sandbox.config_dir().join("config.toml"),
            "[user]\nname = \"Alice\"\nemail = \"alice@example.com\"\n",
        )
        .unwrap();
        sandbox
    }

    pub fn config_dir(&self) -> PathBuf {
        self.temp.path().join("config")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.temp.path().join("state")
    }

    pub fn remotes(&self) -> PathBuf {
        self.temp.path().join("remotes")
    }

    pub fn folders(&self) -> PathBuf {
        self.temp.path().join("Drift")
    }

    pub fn config_text(&self) -> String {
        fs::read_to_string(self.config_dir().join("config.toml")).unwrap()
    }

    /// `drift` pointed at this sandbox, without colors.
    pub fn drift(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("drift");
        cmd.env("DRIFT_CONFIG_DIR", self.config_dir())
            .env("DRIFT_STATE_DIR", self.state_dir())
            .env("HOME", self.temp.path())
            .env("NO_COLOR", "1")
            .env_remove("COLOR")
            .env_remove("RUST_LOG");
        cmd
    }

    /// A remote holding `files` and a folder marker.
    pub fn remote(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.remotes().join(name);
        fs::create_dir_all(&dir).unwrap();
        for (path, content) in files {
            let file = dir.join(path);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, content).unwrap();
        }
        driftrs::marker::write(&dir, &Identifier::generate(&dir)).unwrap();
        dir
    }

    /// `drift add` arguments that copy `remote` and treat sends as no-ops.
    pub fn add_args(&self, remote: &Path, name: &str) -> Vec<String> {
        vec![
            "add".into(),
            remote.display().to_string(),
            "--backend".into(),
            "external".into(),
            "--name".into(),
            name.into(),
            "--path".into(),
            self.folders().join(name).display().to_string(),
            "--command".into(),
            r#"fetch=cp -Rp "$DRIFT_URL" "$DRIFT_TARGET""#.into(),
            "--command".into(),
            r#"sync_up=echo sent >> "$DRIFT_FOLDER.sent""#.into(),
            "--command".into(),
            "sync_down=true".into(),
            "--command".into(),
            "has_remote_changes=false".into(),
            "--command".into(),
            r#"restore=cp "$DRIFT_URL/$DRIFT_PATH" "$DRIFT_TARGET""#.into(),
        ]
    }

    /// Adds a folder named `name` with `files`; returns its path.
    pub fn add(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let remote = self.remote(name, files);
        self.drift()
            .args(self.add_args(&remote, name))
            .assert()
            .success();
        self.folders().join(name)
    }
}

pub fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
