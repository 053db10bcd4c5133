// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::{store::StoreError, window::WindowError};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("The last date ({last}) is before the first ({first})")]
    BackwardsRange { first: NaiveDate, last: NaiveDate },

    #[error("A batch needs a file source to get each day's files from")]
    NoFileSource,

    #[error(transparent)]
    Window(#[from] WindowError),
}

#[derive(Error, Debug)]
pub enum HookError {
    #[error("The store is in memory and can't be copied")]
    NoStoreFile,

    #[error("{0:?} already exists; not overwriting it")]
    DestinationExists(PathBuf),

    #[error("Couldn't snapshot the store: {0}")]
    Store(#[from] StoreError),

    #[error("Couldn't move {from:?} to {to:?}: {err}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        err: std::io::Error,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
