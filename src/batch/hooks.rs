// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! File-system bookkeeping done after a batch.
//!
//! These are never run by [`BatchRunner`](super::BatchRunner) itself; whoever
//! ran the batch decides which hooks to run with the batch's report.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use log::{info, warn};

use super::{BatchReport, HookError};
use crate::store::MetadataStore;

pub trait PostBatchHook {
    fn name(&self) -> &'static str;

    fn run(&self, report: &BatchReport) -> Result<(), HookError>;
}

/// Copy the store into a directory, named after the store file and the time of
/// the copy (e.g. `rawacf_sessions_20170401T000000.sqlite`).
pub struct CopyStore {
    pub store: Arc<MetadataStore>,
    pub dest_dir: PathBuf,
}

impl CopyStore {
    fn dest_path(&self, store_path: &Path) -> PathBuf {
        let stem = store_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "sessions".to_string());
        let ext = store_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        self.dest_dir.join(format!(
            "{stem}_{}{ext}",
            Utc::now().format("%Y%m%dT%H%M%S")
        ))
    }
}

impl PostBatchHook for CopyStore {
    fn name(&self) -> &'static str {
        "copy store"
    }

    fn run(&self, _: &BatchReport) -> Result<(), HookError> {
        let store_path = self.store.path().ok_or(HookError::NoStoreFile)?;
        fs::create_dir_all(&self.dest_dir)?;
        let dest = self.dest_path(store_path);
        if dest.exists() {
            return Err(HookError::DestinationExists(dest));
        }
        // A snapshot rather than a file copy, so the copy is consistent even
        // with the WAL in use.
        self.store.snapshot_to(&dest)?;
        info!("Copied the store to {}", dest.display());
        Ok(())
    }
}

/// Move files (e.g. logs and the quarantine log) into an archive directory.
/// Files that don't exist are ignored.
pub struct MoveFiles {
    pub files: Vec<PathBuf>,
    pub dest_dir: PathBuf,
}

impl PostBatchHook for MoveFiles {
    fn name(&self) -> &'static str {
        "archive files"
    }

    fn run(&self, _: &BatchReport) -> Result<(), HookError> {
        fs::create_dir_all(&self.dest_dir)?;
        for from in self.files.iter().filter(|f| f.is_file()) {
            let Some(name) = from.file_name() else {
                continue;
            };
            let to = self.dest_dir.join(name);
            if fs::rename(from, &to).is_err() {
                // Probably a different file system.
                fs::copy(from, &to)
                    .and_then(|_| fs::remove_file(from))
                    .map_err(|err| HookError::Move {
                        from: from.clone(),
                        to: to.clone(),
                        err,
                    })?;
            }
            info!("Moved {} to {}", from.display(), to.display());
        }
        Ok(())
    }
}

/// Run every hook, returning the failures as (hook name, error) pairs. A
/// failing hook doesn't stop the others.
pub fn run_hooks(
    hooks: &[Box<dyn PostBatchHook>],
    report: &BatchReport,
) -> Vec<(&'static str, HookError)> {
    hooks
        .iter()
        .filter_map(|hook| match hook.run(report) {
            Ok(()) => None,
            Err(e) => {
                warn!("Post-batch hook '{}' failed: {e}", hook.name());
                Some((hook.name(), e))
            }
        })
        .collect()
}
