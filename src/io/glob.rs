// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Functions to glob files.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use glob::{glob, Pattern};
use thiserror::Error;

use crate::site::SiteCode;

/// Given a glob pattern, get all of the matches from the filesystem, sorted
/// by path.
pub(crate) fn get_all_matches_from_glob(g: &str) -> Result<Vec<PathBuf>, GlobError> {
    let mut entries = vec![];
    for entry in glob(g)? {
        match entry {
            Ok(e) => entries.push(e),
            Err(e) => return Err(GlobError::GlobCrate(e)),
        }
    }
    entries.sort();
    Ok(entries)
}

/// The glob pattern matching one day's rawacf files in `dir`, e.g.
/// `dir/20170328.*.sas.rawacf*`. Any glob metacharacters in `dir` are
/// escaped.
pub(crate) fn day_pattern(dir: &Path, date: NaiveDate, site: Option<&SiteCode>) -> String {
    format!(
        "{}/{}.*.{}.rawacf*",
        Pattern::escape(&dir.display().to_string()),
        date.format("%Y%m%d"),
        site.map(|s| s.as_str()).unwrap_or("*")
    )
}

#[derive(Error, Debug)]
/// Error type associated with glob helper functions.
pub enum GlobError {
    #[error(transparent)]
    GlobCrate(#[from] glob::GlobError),

    #[error(transparent)]
    PatternError(#[from] glob::PatternError),
}
