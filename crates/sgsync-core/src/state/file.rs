// # File State Store
//
// File-based implementation of StateStore.
//
// ## Purpose
//
// Keeps the last known IP and the last verification time across process
// invocations, so a scheduled run with nothing to do makes no API calls.
//
// ## File Format
//
// Two plain text files in the state directory, one value each:
//
// ```text
// current_ip.txt   203.0.113.7
// last_update.txt  2025-01-09T12:00:00.123456+00:00
// ```
//
// ## Crash Safety
//
// - The state directory is created once, before the first write
// - Each value is written to a `.tmp` sibling, synced, then renamed over
//   the real file, so readers never see a half-written value
// - Unreadable or garbled files read back as "absent" (the next pass
//   re-inspects the remote rule set and rewrites them)

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;

use crate::Error;
use crate::traits::state_store::{PersistedState, StateStore};

/// File name holding the last known IP
pub const IP_FILE_NAME: &str = "current_ip.txt";

/// File name holding the last verification timestamp
pub const TIMESTAMP_FILE_NAME: &str = "last_update.txt";

/// File-based state store
///
/// # Example
///
/// ```rust,no_run
/// use sgsync_core::state::FileStateStore;
/// use sgsync_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/data");
///
///     store.write_ip("203.0.113.7".parse()?).await?;
///
///     let state = store.read_state().await;
///     assert_eq!(state.last_known_ip, Some("203.0.113.7".parse()?));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    dir: PathBuf,
    ip_path: PathBuf,
    timestamp_path: PathBuf,
    location: OnceCell<()>,
}

impl FileStateStore {
    /// Create a store rooted at `dir`
    ///
    /// No I/O happens here; the directory is created lazily by the first
    /// write.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            ip_path: dir.join(IP_FILE_NAME),
            timestamp_path: dir.join(TIMESTAMP_FILE_NAME),
            dir,
            location: OnceCell::new(),
        }
    }

    /// Path of the IP file
    pub fn ip_path(&self) -> &Path {
        &self.ip_path
    }

    /// Path of the timestamp file
    pub fn timestamp_path(&self) -> &Path {
        &self.timestamp_path
    }

    /// Make sure the state directory exists
    ///
    /// Runs the `create_dir_all` at most once per store; later calls return
    /// immediately. A failed attempt is not cached, so the next write tries
    /// again.
    pub async fn ensure_location(&self) -> Result<(), Error> {
        self.location
            .get_or_try_init(|| async {
                if self.dir.as_os_str().is_empty() {
                    return Ok::<(), Error>(());
                }
                fs::create_dir_all(&self.dir).await.map_err(|e| {
                    Error::persistence(format!(
                        "Failed to create state directory {}: {}",
                        self.dir.display(),
                        e
                    ))
                })?;
                tracing::debug!(dir = %self.dir.display(), "State directory ready");
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }

    /// Read a single value file, treating every failure as "absent"
    async fn read_value(path: &Path) -> Option<String> {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let value = content.trim();
                if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "State file does not exist");
                None
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read state file");
                None
            }
        }
    }

    /// Write a value file atomically (temp file, sync, rename)
    async fn write_value(&self, path: &Path, value: &str) -> Result<(), Error> {
        self.ensure_location().await?;

        let temp_path = temp_path(path);
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(value.as_bytes()).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, path).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::trace!(path = %path.display(), "State value written");
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read_state(&self) -> PersistedState {
        let last_known_ip = Self::read_value(&self.ip_path).await.and_then(|raw| {
            raw.parse::<Ipv4Addr>()
                .map_err(|e| {
                    tracing::warn!(
                        path = %self.ip_path.display(),
                        value = %raw,
                        error = %e,
                        "Ignoring unparsable IP in state file"
                    );
                })
                .ok()
        });

        let last_verified_at = Self::read_value(&self.timestamp_path)
            .await
            .and_then(|raw| {
                let parsed = parse_timestamp(&raw);
                if parsed.is_none() {
                    tracing::warn!(
                        path = %self.timestamp_path.display(),
                        value = %raw,
                        "Ignoring unparsable timestamp in state file"
                    );
                }
                parsed
            });

        PersistedState {
            last_known_ip,
            last_verified_at,
        }
    }

    async fn write_ip(&self, ip: Ipv4Addr) -> Result<(), Error> {
        self.write_value(&self.ip_path, &ip.to_string()).await?;
        tracing::info!(ip = %ip, "IP saved to state file");
        Ok(())
    }

    async fn write_verified_at(&self, at: DateTime<Utc>) -> Result<(), Error> {
        self.write_value(&self.timestamp_path, &at.to_rfc3339())
            .await?;
        tracing::info!(verified_at = %at.to_rfc3339(), "Verification timestamp saved");
        Ok(())
    }
}

/// Parse a stored timestamp
///
/// RFC 3339 is what this store writes. Older state directories may hold a
/// naive ISO-8601 local time with no offset; those are read in the local
/// timezone.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut temp = path.to_path_buf();
    temp.set_extension("tmp");
    temp
}
