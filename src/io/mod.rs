// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! File stuff (globs, directory listings).

mod glob;

pub use self::glob::GlobError;
pub(crate) use self::glob::{day_pattern, get_all_matches_from_glob};

use std::path::{Path, PathBuf};

/// All regular files directly inside `dir`, sorted by path. Subdirectories
/// are not descended into.
pub(crate) fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
