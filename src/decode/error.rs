// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors from decoding rawacf files.

use std::path::PathBuf;

use thiserror::Error;

use super::dmap::DmapError;
use crate::quarantine::FailureReason;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("{0:?} is not a rawacf file")]
    NotRawacf(PathBuf),

    #[error("No decompressor is configured for {0} files")]
    NoDecompressor(&'static str),

    #[error("Couldn't run decompressor '{command}': {err}")]
    DecompressorUnavailable {
        command: String,
        err: std::io::Error,
    },

    #[error("Decompressor '{command}' failed ({status}): {stderr}")]
    DecompressorFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Couldn't decompress gzip stream: {0}")]
    Gzip(std::io::Error),

    #[error(transparent)]
    Dmap(#[from] DmapError),

    #[error("Only {0} DMAP record(s) found; a session needs at least two")]
    TooFewRecords(usize),

    #[error("Record {record} has no '{name}' scalar")]
    MissingField { record: usize, name: &'static str },

    #[error("Record {record}: '{name}' has an unexpected data type")]
    WrongFieldType { record: usize, name: &'static str },

    #[error("Record {record} has an invalid timestamp: {detail}")]
    BadTimestamp { record: usize, detail: String },

    #[error("Station ID {0} doesn't belong to any known radar")]
    UnknownStation(i32),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl DecodeError {
    /// The quarantine tag for this failure.
    pub fn reason(&self) -> FailureReason {
        match self {
            DecodeError::NoDecompressor(_) | DecodeError::DecompressorUnavailable { .. } => {
                FailureReason::UnsupportedCompression
            }
            DecodeError::Gzip(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                FailureReason::Truncated
            }
            DecodeError::Dmap(e) => e.reason(),
            DecodeError::TooFewRecords(_) => FailureReason::Truncated,
            DecodeError::UnknownStation(_) => FailureReason::UnknownStation,
            DecodeError::IO(_) => FailureReason::IoError,
            DecodeError::NotRawacf(_)
            | DecodeError::DecompressorFailed { .. }
            | DecodeError::Gzip(_)
            | DecodeError::MissingField { .. }
            | DecodeError::WrongFieldType { .. }
            | DecodeError::BadTimestamp { .. } => FailureReason::FormatError,
        }
    }
}
