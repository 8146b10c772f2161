// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The hidden `.drift_id` file holding a folder's [`Identifier`].
//!
//! The marker travels with the folder's content, so every replica of a
//! folder reads the same identifier and announcements reach all of them.

use std::fs;
use std::path::{Path, PathBuf};

use drift_core::Identifier;

use crate::error::{Error, Result};

pub const MARKER_FILE_NAME: &str = ".drift_id";

pub fn marker_path(folder: &Path) -> PathBuf {
    folder.join(MARKER_FILE_NAME)
}

/// Reads the identifier stored in `folder`.
pub fn read(folder: &Path) -> Result<Identifier> {
    let path = marker_path(folder);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::MarkerMissing(folder.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Identifier::parse(&content)?)
}

/// Writes `identifier` to the marker, resetting its permission bits.
pub fn write(folder: &Path, identifier: &Identifier) -> Result<()> {
    let path = marker_path(folder);
    fs::write(&path, format!("{}\n", identifier))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;
    }
    Ok(())
}

/// Existing identifier of `folder`, or a freshly generated one written to
/// its marker.
pub fn read_or_create(folder: &Path) -> Result<Identifier> {
    match read(folder) {
        Ok(identifier) => Ok(identifier),
        Err(Error::MarkerMissing(_)) | Err(Error::Core(_)) => {
            let identifier = Identifier::generate(folder);
            write(folder, &identifier)?;
            Ok(identifier)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "marker_tests.rs"]
mod tests;
