//! Session working directories: one isolated scope per processed file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Creates a fresh session directory under `base` with a unique name.
pub fn create(base: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(base)
        .with_context(|| format!("failed to create session base: {}", base.display()))?;
    let dir = tempfile::Builder::new()
        .prefix("session-")
        .tempdir_in(base)
        .with_context(|| "failed to create session directory")?;
    Ok(dir.into_path())
}

/// Deletes one session directory. Used by the web form's reset action and
/// safe to call on an already-removed directory.
pub fn remove(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)
            .with_context(|| format!("failed to remove session: {}", dir.display()))?;
        info!("deleted session directory: {}", dir.display());
    }
    Ok(())
}

/// Best-effort sweep of session directories older than `max_age`, judged by
/// modification time. Invoked opportunistically on new requests; errors on
/// individual directories are logged and skipped.
pub fn sweep(base: &Path, max_age: Duration) {
    let Ok(entries) = std::fs::read_dir(base) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map(|age| age > max_age)
            .unwrap_or(false);
        if expired {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => info!("removed stale session: {}", path.display()),
                Err(err) => warn!("failed to remove stale session {}: {}", path.display(), err),
            }
        }
    }
}
