// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::env::var("OUT_DIR")?;
    let path = std::path::Path::new(&out_dir).join("env_vars.rs");
    let mut f = std::fs::File::create(path)?;

    let vars = [
        ("NO_COLOR", "NO_COLOR"),
        ("COLOR", "COLOR"),
        ("DRIFT_CONFIG_DIR", "DRIFT_CONFIG_DIR"),
        ("XDG_CONFIG_HOME", "XDG_CONFIG_HOME"),
        ("DRIFT_STATE_DIR", "DRIFT_STATE_DIR"),
        ("XDG_STATE_HOME", "XDG_STATE_HOME"),
        ("DRIFT_GIT", "DRIFT_GIT"),
    ];

    for (const_name, env_name) in &vars {
        writeln!(f, "pub const {const_name}: &str = \"{env_name}\";")?;
    }

    Ok(())
}
