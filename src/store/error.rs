// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::site::SiteCode;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Couldn't open session store {path:?}: {err}")]
    Open {
        path: PathBuf,
        err: rusqlite::Error,
    },

    #[error("The session store contains an invalid site code '{0}'")]
    BadSite(String),

    #[error("The session store contains an unrepresentable time for site {site} ({start} to {end})")]
    BadTime { site: SiteCode, start: i64, end: i64 },

    #[error("Session store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
