// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Removable drive resolution
//!
//! The field units mount the survey drive at one well-known location. There
//! is deliberately no probing of alternates: either the drive is there and
//! actually mounted, or the scan reports `NoMountFound`.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{OakwatchError, Result};

/// Resolve the removable drive, or fail with `NoMountFound`.
///
/// The path must exist and be a real mount point. An empty directory left
/// behind by a previous session (or created by an overeager automounter)
/// does not count.
pub fn resolve(mount_path: &Path) -> Result<PathBuf> {
    if !mount_path.is_dir() {
        debug!("Mount location {:?} does not exist", mount_path);
        return Err(OakwatchError::NoMountFound);
    }

    if !is_mount_point(mount_path)? {
        debug!("Mount location {:?} exists but nothing is mounted there", mount_path);
        return Err(OakwatchError::NoMountFound);
    }

    Ok(mount_path.to_path_buf())
}

/// A directory is a mount point when it sits on a different device than its
/// parent.
#[cfg(unix)]
fn is_mount_point(path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let meta = std::fs::metadata(path)?;
    let parent = match path.parent() {
        Some(p) => p,
        // Filesystem root is by definition a mount point
        None => return Ok(true),
    };
    let parent_meta = std::fs::metadata(parent)?;

    Ok(meta.dev() != parent_meta.dev())
}

#[cfg(not(unix))]
fn is_mount_point(_path: &Path) -> Result<bool> {
    // Non-unix targets get the existence check only
    Ok(true)
}
