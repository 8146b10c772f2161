// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot creation of a local working copy from a remote address.
//!
//! The adapter clones into a `<target>.tmp` sibling; only a complete,
//! bootstrapped clone is moved into place and stamped with its marker.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use drift_core::{Identifier, StorageType, User};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{
    self, tree_size, BackendKind, Bootstrap, ExternalCommands, Fetch, StorageOffer, SyncContext,
    SyncReporter,
};
use crate::error::{Error, Result};
use crate::marker;

/// Written into folders that were empty on the remote.
pub const WELCOME_FILE_NAME: &str = "drift.txt";

/// History above this size is reported as a warning.
pub const LARGE_HISTORY_BYTES: u64 = 256 * 1024 * 1024;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// What to fetch and how.
#[derive(Debug, Clone, Default)]
pub struct FetcherInfo {
    pub address: String,
    /// Explicit backend; otherwise taken from an `ssh+<backend>://` address.
    pub backend: Option<BackendKind>,
    pub fingerprint: Option<String>,
    pub announcements_url: Option<String>,
    pub password: Option<String>,
    pub tool: Option<PathBuf>,
    pub commands: Option<ExternalCommands>,
}

/// An address in canonical form together with the backend serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAddress {
    pub address: String,
    pub backend: BackendKind,
}

fn is_local_path(address: &str) -> bool {
    address == "."
        || address.starts_with('/')
        || address.starts_with("./")
        || address.starts_with("../")
        || address.starts_with("~/")
        || Path::new(address).is_absolute()
}

/// Canonicalizes a user-supplied address.
///
/// Whitespace and trailing slashes are trimmed. `ssh+<backend>://` selects
/// the backend and becomes `ssh://`; addresses without a scheme that are
/// not local paths get `ssh://`. An explicit `backend` overrides the one
/// named in the address.
pub fn normalize_address(raw: &str, backend: Option<BackendKind>) -> Result<NormalizedAddress> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidAddress(raw.to_string()));
    }

    let (address, named) = match trimmed.split_once("://") {
        Some((scheme, rest)) if scheme.to_ascii_lowercase().starts_with("ssh+") => {
            let kind = BackendKind::from_str(&scheme[4..])?;
            (format!("ssh://{}", rest), Some(kind))
        }
        Some((scheme, rest)) => {
            if scheme.is_empty() || rest.is_empty() {
                return Err(Error::InvalidAddress(raw.to_string()));
            }
            (trimmed.to_string(), None)
        }
        None if is_local_path(trimmed) => (trimmed.to_string(), None),
        None => (format!("ssh://{}", trimmed), None),
    };

    Ok(NormalizedAddress {
        address,
        backend: backend.or(named).unwrap_or_default(),
    })
}

/// Default folder name for an address: its last path segment without a
/// `.git` suffix.
pub fn folder_name(address: &str) -> String {
    let path = address
        .split_once("://")
        .map_or(address, |(_, rest)| rest.split_once('/').map_or("", |(_, p)| p));
    let last = path
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or("");
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name == "." || name == ".." {
        "folder".to_string()
    } else {
        name.to_string()
    }
}

/// Removes `user:password@` from http(s) addresses.
pub fn redact_credentials(address: &str) -> String {
    let Some((scheme, rest)) = address.split_once("://") else {
        return address.to_string();
    };
    if !scheme.to_ascii_lowercase().starts_with("http") {
        return address.to_string();
    }
    let (authority, path) = rest.split_once('/').map_or((rest, None), |(a, p)| (a, Some(p)));
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    match path {
        Some(path) => format!("{}://{}/{}", scheme, host, path),
        None => format!("{}://{}", scheme, host),
    }
}

fn welcome_text(address: &str, storage: StorageType) -> String {
    let kind = match storage {
        StorageType::Encrypted => "an encrypted drift folder",
        _ => "a drift folder",
    };
    format!(
        "Congratulations, you've successfully created {}!\n\n\
         Any files you add or change in this folder will be synced automatically\n\
         to {} and everyone connected to it.\n",
        kind,
        redact_credentials(address)
    )
}

/// Forwards progress at most once per interval, never backwards.
struct ThrottledReporter {
    inner: Arc<dyn SyncReporter>,
    interval: Duration,
    last: Mutex<Option<(Instant, f64)>>,
}

impl ThrottledReporter {
    fn new(inner: Arc<dyn SyncReporter>, interval: Duration) -> Self {
        ThrottledReporter {
            inner,
            interval,
            last: Mutex::new(None),
        }
    }
}

impl SyncReporter for ThrottledReporter {
    fn progress(&self, percentage: f64, speed: Option<&str>, message: &str) {
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        if let Some((at, reported)) = *last {
            if percentage < reported {
                return;
            }
            if percentage < 100.0 && now.duration_since(at) < self.interval {
                return;
            }
        }
        *last = Some((now, percentage));
        drop(last);
        self.inner.progress(percentage, speed, message);
    }
}

/// Result of a completed fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub identifier: Identifier,
    pub address: String,
    pub backend: BackendKind,
    pub storage: StorageType,
    pub fingerprint: Option<String>,
    pub announcements_url: Option<String>,
    pub warnings: Vec<String>,
}

pub struct Fetcher {
    info: FetcherInfo,
    remote: NormalizedAddress,
    target: PathBuf,
    tmp: PathBuf,
    user: User,
    fetch: Box<dyn Fetch>,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(info: FetcherInfo, target: &Path, user: User) -> Result<Self> {
        let remote = normalize_address(&info.address, info.backend)?;
        let fetch = backend::fetcher(remote.backend, info.tool.clone(), info.commands.clone())?;
        Self::with_fetch(info, remote, target, user, fetch)
    }

    pub fn with_fetch(
        info: FetcherInfo,
        remote: NormalizedAddress,
        target: &Path,
        user: User,
        fetch: Box<dyn Fetch>,
    ) -> Result<Self> {
        let file_name = target
            .file_name()
            .ok_or_else(|| Error::InvalidAddress(target.display().to_string()))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        Ok(Fetcher {
            info,
            remote,
            tmp: target.with_file_name(tmp_name),
            target: target.to_path_buf(),
            user,
            fetch,
            cancel: CancellationToken::new(),
        })
    }

    pub fn remote(&self) -> &NormalizedAddress {
        &self.remote
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn temp_path(&self) -> &Path {
        &self.tmp
    }

    /// Fetches, bootstraps and moves the copy into place.
    pub fn run(&self, reporter: Arc<dyn SyncReporter>) -> Result<FetchOutcome> {
        if self.target.exists() {
            return Err(Error::TargetExists(self.target.display().to_string()));
        }
        if let Some(parent) = self.tmp.parent() {
            fs::create_dir_all(parent)?;
        }
        self.remove_temp();

        info!(
            "fetching {} into {} ({})",
            self.remote.address,
            self.target.display(),
            self.remote.backend
        );
        let result = self.fetch_into_temp(reporter);
        if result.is_err() {
            self.remove_temp();
        }
        let (storage, warnings) = result?;

        fs::rename(&self.tmp, &self.target)?;
        let identifier = marker::read_or_create(&self.target)?;
        info!("fetched {} as {}", self.target.display(), identifier);

        Ok(FetchOutcome {
            identifier,
            address: self.remote.address.clone(),
            backend: self.remote.backend,
            storage,
            fingerprint: self.info.fingerprint.clone(),
            announcements_url: self.info.announcements_url.clone(),
            warnings,
        })
    }

    fn fetch_into_temp(
        &self,
        reporter: Arc<dyn SyncReporter>,
    ) -> Result<(StorageType, Vec<String>)> {
        let throttled: Arc<dyn SyncReporter> =
            Arc::new(ThrottledReporter::new(reporter, PROGRESS_INTERVAL));
        let ctx = SyncContext::new(self.cancel.child_token()).with_reporter(throttled);

        let offer = self.choose_storage(&ctx)?;
        if let Err(failure) = self.fetch.fetch(&self.remote.address, &self.tmp, &ctx) {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            return Err(failure.into());
        }
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if !self.tmp.is_dir() {
            return Err(Error::EmptyFetch);
        }

        let metadata_dir = self.fetch.metadata_dir();
        if self.is_empty(metadata_dir)? {
            info!("remote folder is empty, adding {}", WELCOME_FILE_NAME);
            fs::write(
                self.tmp.join(WELCOME_FILE_NAME),
                welcome_text(&self.remote.address, offer.storage_type),
            )?;
        }

        let setup = Bootstrap {
            user: &self.user,
            address: &self.remote.address,
            storage: offer.storage_type,
            salt: offer.salt.as_deref(),
            password: self.info.password.as_deref(),
        };
        self.fetch.bootstrap(&self.tmp, &setup)?;

        let mut warnings = Vec::new();
        let history = tree_size(&self.tmp.join(metadata_dir), &[]);
        if history > LARGE_HISTORY_BYTES {
            let warning = format!(
                "large history: {} MiB of past revisions were downloaded",
                history / (1024 * 1024)
            );
            warn!("{}", warning);
            warnings.push(warning);
        }
        Ok((offer.storage_type, warnings))
    }

    fn choose_storage(&self, ctx: &SyncContext) -> Result<StorageOffer> {
        let offers = self.fetch.storage_offers(&self.remote.address, ctx);
        if let Some(encrypted) = offers
            .iter()
            .find(|o| o.storage_type == StorageType::Encrypted)
        {
            if self.info.password.is_none() {
                return Err(Error::PasswordRequired);
            }
            return Ok(encrypted.clone());
        }
        Ok(offers
            .into_iter()
            .find(|o| o.storage_type == StorageType::LargeFiles)
            .unwrap_or_else(StorageOffer::plain))
    }

    fn is_empty(&self, metadata_dir: &str) -> Result<bool> {
        for entry in fs::read_dir(&self.tmp)? {
            if entry?.file_name() != metadata_dir {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Cancels a running fetch and removes the partial copy.
    pub fn stop(&self) {
        info!("fetch of {} stopped", self.remote.address);
        self.cancel.cancel();
        self.remove_temp();
    }

    fn remove_temp(&self) {
        match fs::remove_dir_all(&self.tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove {}: {}", self.tmp.display(), e),
        }
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("remote", &self.remote)
            .field("target", &self.target)
            .finish()
    }
}

#[cfg(test)]
#[path = "fetcher_tests.rs"]
mod tests;
