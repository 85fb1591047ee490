// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Candidate discovery on the mounted drive
//!
//! Walks the volume for image files, excluding hidden entries and OS litter,
//! then bounds the set two ways: a recency window (the pipeline triages this
//! week's survey flight, not years of archive) and a newest-N cap that keeps
//! worst-case scan duration predictable.

use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Image extensions the classifier pipeline accepts (matched case-insensitively).
const VALID_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Non-hidden system directories that still must be skipped.
const SYSTEM_DIRS: &[&str] = &["System Volume Information", "$RECYCLE.BIN", "lost+found"];

/// A file that passed discovery, with the modification time that ranked it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

/// Discover qualifying image files under `root`, newest first, capped at
/// `max_candidates`.
pub fn discover(root: &Path, recency_days: i64, max_candidates: usize) -> Vec<Candidate> {
    let now = Utc::now();
    let mut candidates = Vec::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded_dir_or_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry during discovery: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_image_extension(entry.path()) {
            continue;
        }

        let modified = match entry
            .metadata()
            .map_err(std::io::Error::from)
            .and_then(|m| m.modified())
        {
            Ok(t) => system_time_to_utc(t),
            Err(e) => {
                warn!("Skipping {:?}: cannot read modification time: {}", entry.path(), e);
                continue;
            }
        };

        if !within_window(modified, now, recency_days) {
            debug!("Skipping {:?}: older than {} days", entry.path(), recency_days);
            continue;
        }

        candidates.push(Candidate { path: entry.into_path(), modified });
    }

    select_newest(candidates, max_candidates)
}

/// Hidden directory segments and OS trash/system directories are pruned from
/// the walk entirely; hidden files are dropped individually (covers macOS
/// `._` sidecars and the like).
fn is_excluded_dir_or_hidden(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    entry.file_type().is_dir() && SYSTEM_DIRS.iter().any(|d| *d == name)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| VALID_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn within_window(modified: DateTime<Utc>, now: DateTime<Utc>, recency_days: i64) -> bool {
    modified >= now - Duration::days(recency_days)
}

fn system_time_to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

/// Sort newest first and truncate to the cap. Discovery order downstream of
/// this point is the ranked order.
fn select_newest(mut candidates: Vec<Candidate>, max_candidates: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.modified.cmp(&a.modified));
    candidates.truncate(max_candidates);
    candidates
}
