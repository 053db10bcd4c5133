// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::{fetch::FetchError, quarantine::QuarantineError, store::StoreError};

/// Errors that stop a whole scope. Problems with individual files never end
/// up here; they are quarantined.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{0:?} does not exist")]
    ScopeUnavailable(PathBuf),

    #[error("A day was requested, but no file source was given")]
    NoFileSource,

    #[error("Couldn't write to the session store: {0}")]
    Store(#[from] StoreError),

    #[error("Couldn't write to the quarantine log: {0}")]
    Quarantine(#[from] QuarantineError),

    #[error("The {0} thread panicked")]
    WorkerPanicked(&'static str),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
