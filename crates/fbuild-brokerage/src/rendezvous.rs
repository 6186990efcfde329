//! Shared-filesystem rendezvous backend.
//!
//! Each available worker keeps a zero-byte sentinel file named after its
//! host identity under the versioned brokerage directory; clients
//! enumerate that directory to discover workers. Presence of the file is
//! the entire advertisement, so a fleet-wide cleanup is just `rm -r` on
//! the directory.

use std::path::Path;

use tokio::fs;
use tracing::{debug, error, warn};

use fbuild_proto::error::{BrokerageError, BrokerageResult};

/// List the worker identities advertised under `root`.
///
/// Non-recursive; each entry's basename is a worker identity (hostname or
/// dotted quad). A missing or empty directory means "no workers", not an
/// error.
pub async fn enumerate(root: &Path) -> Vec<String> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(_) => {
            warn!("no workers found in '{}'", root.display());
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    if names.is_empty() {
        warn!("no workers found in '{}'", root.display());
    }
    names
}

/// Advertise availability: ensure `root` exists, then create the sentinel
/// file. Create-if-missing; an already-present sentinel is left
/// untouched.
pub async fn announce(root: &Path, sentinel: &Path) -> BrokerageResult<()> {
    fs::create_dir_all(root).await.map_err(|e| {
        error!("failed to create brokerage directory {}: {}", root.display(), e);
        BrokerageError::Io
    })?;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .open(sentinel)
        .await
        .map_err(|e| {
            error!("failed to create sentinel {}: {}", sentinel.display(), e);
            BrokerageError::Io
        })?;

    debug!("advertised availability at {}", sentinel.display());
    Ok(())
}

/// Revoke availability by deleting the sentinel. Absence is not an error.
pub async fn revoke(sentinel: &Path) -> BrokerageResult<()> {
    match fs::remove_file(sentinel).await {
        Ok(()) => {
            debug!("removed sentinel {}", sentinel.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("failed to remove sentinel {}: {}", sentinel.display(), e);
            Err(BrokerageError::Io)
        }
    }
}
