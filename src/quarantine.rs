// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The quarantine log: an append-only JSON-lines file of every file that
//! failed to decode or validate.

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use log::trace;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, IntoStaticStr};
use thiserror::Error;

/// Why a file was quarantined.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureReason {
    FormatError,
    Truncated,
    UnsupportedVersion,
    UnsupportedCompression,
    UnknownStation,
    IoError,
    Timeout,
    DecoderPanicked,
    EndBeforeStart,
    BadSiteCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineEntry {
    pub file: String,
    pub reason: FailureReason,
    pub detail: String,
    pub attempted_at: DateTime<Utc>,
}

impl QuarantineEntry {
    pub fn new(
        file: &Path,
        reason: FailureReason,
        detail: String,
        attempted_at: DateTime<Utc>,
    ) -> QuarantineEntry {
        QuarantineEntry {
            file: file.display().to_string(),
            reason,
            detail,
            attempted_at,
        }
    }
}

/// Appends are serialised internally, so a log can be shared between threads.
/// Every entry is flushed as soon as it's written.
pub struct QuarantineLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl QuarantineLog {
    /// Open (or create) a quarantine log. Existing entries are kept.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<QuarantineLog, QuarantineError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| QuarantineError::Open {
                path: path.clone(),
                err: e,
            })?;
        Ok(QuarantineLog {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &QuarantineEntry) -> Result<(), QuarantineError> {
        trace!("Quarantining {} ({})", entry.file, entry.reason);
        let line = serde_json::to_string(entry)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }

    /// Read every entry of a quarantine log.
    pub fn read_entries<P: AsRef<Path>>(path: P) -> Result<Vec<QuarantineEntry>, QuarantineError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| QuarantineError::Open {
            path: path.to_path_buf(),
            err: e,
        })?;
        let mut entries = vec![];
        for (i_line, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| QuarantineError::BadLine {
                path: path.to_path_buf(),
                line: i_line + 1,
                err: e,
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[derive(Error, Debug)]
pub enum QuarantineError {
    #[error("Couldn't open quarantine log {path:?}: {err}")]
    Open {
        path: PathBuf,
        err: std::io::Error,
    },

    #[error("Quarantine log {path:?} line {line} is malformed: {err}")]
    BadLine {
        path: PathBuf,
        line: usize,
        err: serde_json::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
