//! Waiting for files written by other processes
//!
//! Mounted files (credentials, tokens, CA bundles) can appear arbitrarily
//! late. Instead of polling, the containing directory is watched and the file
//! is read once a matching create, rename or write event arrives. The watch is
//! registered before the existence check so an event between the two cannot
//! be missed.

use notify::event::{AccessKind, AccessMode, EventKind};
use notify::{Event, RecursiveMode, Watcher};
use serde::de::DeserializeOwned;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Errors that can occur while waiting for a file
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("path {0} has no file name")]
    InvalidPath(PathBuf),

    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watcher for {0} stopped before the file appeared")]
    Closed(PathBuf),
}

/// Waits until `path` exists with non-blank contents and returns them
///
/// A file holding only whitespace is treated as still being written.
pub async fn wait_for_file(path: &Path) -> Result<Vec<u8>, WatchError> {
    wait_for(path, |bytes| {
        if bytes.trim_ascii().is_empty() {
            Err("file is empty")
        } else {
            Ok(bytes.to_vec())
        }
    })
    .await
}

/// Waits until `path` exists and holds valid JSON for `T`
///
/// A file that exists but does not parse is treated as still being written:
/// the wait continues until a later write produces valid contents.
pub async fn wait_for_json<T: DeserializeOwned>(path: &Path) -> Result<T, WatchError> {
    wait_for(path, |bytes| serde_json::from_slice::<T>(bytes)).await
}

async fn wait_for<T, E, F>(path: &Path, parse: F) -> Result<T, WatchError>
where
    E: std::fmt::Display,
    F: Fn(&[u8]) -> Result<T, E>,
{
    let file_name = path
        .file_name()
        .ok_or_else(|| WatchError::InvalidPath(path.to_path_buf()))?
        .to_os_string();
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        // The receiver is gone once the file was found.
        let _ = tx.send(event);
    })
    .map_err(|source| WatchError::Watch {
        path: directory.clone(),
        source,
    })?;
    watcher
        .watch(&directory, RecursiveMode::NonRecursive)
        .map_err(|source| WatchError::Watch {
            path: directory.clone(),
            source,
        })?;

    if let Some(value) = try_read(path, &parse).await? {
        return Ok(value);
    }

    debug!("Waiting for {} to appear", path.display());

    while let Some(event) = rx.recv().await {
        let event = event.map_err(|source| WatchError::Watch {
            path: directory.clone(),
            source,
        })?;

        if !is_relevant(&event, &file_name) {
            continue;
        }

        if let Some(value) = try_read(path, &parse).await? {
            debug!("{} is available", path.display());
            return Ok(value);
        }
    }

    Err(WatchError::Closed(path.to_path_buf()))
}

/// Reads and parses the file; `None` means "not ready yet"
async fn try_read<T, E, F>(path: &Path, parse: &F) -> Result<Option<T>, WatchError>
where
    E: std::fmt::Display,
    F: Fn(&[u8]) -> Result<T, E>,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(WatchError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    match parse(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("{} is not readable yet: {}", path.display(), e);
            Ok(None)
        }
    }
}

fn is_relevant(event: &Event, file_name: &OsStr) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(_)
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Any
    );

    kind_matches
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name))
}
