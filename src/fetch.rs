// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Where candidate rawacf files come from.
//!
//! The ingestion pipeline never transfers files itself; it asks a
//! [`FileSource`] for the local files of a (site, date) scope. Any network
//! transfer is done by an external program (see [`SyncCommand`]).

use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use chrono::{Datelike, NaiveDate};
use log::{debug, info, trace};
use thiserror::Error;

use crate::{
    io::{day_pattern, get_all_matches_from_glob, GlobError},
    site::SiteCode,
};

pub trait FileSource: Send + Sync {
    /// Local files believed to hold a site's (or every site's) data for a
    /// date.
    fn candidates(
        &self,
        site: Option<&SiteCode>,
        date: NaiveDate,
    ) -> Result<Vec<PathBuf>, FetchError>;

    /// Called once a date has been ingested. Sources that fetch files into a
    /// scratch area should clear them here.
    fn release(&self, _site: Option<&SiteCode>, _date: NaiveDate) -> Result<(), FetchError> {
        Ok(())
    }

    /// A short human-readable description, for logging.
    fn describe(&self) -> String;
}

/// Files that are already on disk, in a flat directory of SuperDARN-named
/// files (e.g. `20170328.0001.00.sas.rawacf.bz2`).
#[derive(Debug, Clone)]
pub struct LocalArchive {
    dir: PathBuf,
}

impl LocalArchive {
    pub fn new<P: Into<PathBuf>>(dir: P) -> LocalArchive {
        LocalArchive { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSource for LocalArchive {
    fn candidates(
        &self,
        site: Option<&SiteCode>,
        date: NaiveDate,
    ) -> Result<Vec<PathBuf>, FetchError> {
        if !self.dir.is_dir() {
            return Err(FetchError::Unavailable(self.dir.clone()));
        }
        let pattern = day_pattern(&self.dir, date, site);
        trace!("Globbing {pattern}");
        Ok(get_all_matches_from_glob(&pattern)?)
    }

    fn describe(&self) -> String {
        format!("local archive {}", self.dir.display())
    }
}

/// Runs an external transfer program (e.g. a Globus sync script) to copy a
/// day's files into a local endpoint directory, then serves them like a
/// [`LocalArchive`]. Fetched files are deleted on release.
///
/// The program's arguments may contain these placeholders:
///
/// - `{year}` (e.g. 2017)
/// - `{month}` (e.g. 03)
/// - `{pattern}` (e.g. `20170328*sas`, or `20170328*` for all sites)
/// - `{endpoint}` (the endpoint directory)
#[derive(Debug, Clone)]
pub struct SyncCommand {
    program: String,
    args: Vec<String>,
    endpoint: LocalArchive,
}

impl SyncCommand {
    /// `command` is split on whitespace into a program and its arguments.
    pub fn new<P: Into<PathBuf>>(command: &str, endpoint: P) -> Result<SyncCommand, FetchError> {
        let mut words = command.split_whitespace().map(|s| s.to_string());
        let program = words.next().ok_or(FetchError::EmptyCommand)?;
        Ok(SyncCommand {
            program,
            args: words.collect(),
            endpoint: LocalArchive::new(endpoint),
        })
    }

    fn expand_args(&self, site: Option<&SiteCode>, date: NaiveDate) -> Vec<String> {
        let pattern = format!(
            "{}*{}",
            date.format("%Y%m%d"),
            site.map(|s| s.as_str()).unwrap_or("")
        );
        self.args
            .iter()
            .map(|a| {
                a.replace("{year}", &date.year().to_string())
                    .replace("{month}", &format!("{:02}", date.month()))
                    .replace("{pattern}", &pattern)
                    .replace("{endpoint}", &self.endpoint.dir().display().to_string())
            })
            .collect()
    }
}

impl FileSource for SyncCommand {
    fn candidates(
        &self,
        site: Option<&SiteCode>,
        date: NaiveDate,
    ) -> Result<Vec<PathBuf>, FetchError> {
        let args = self.expand_args(site, date);
        let command = format!("{} {}", self.program, args.join(" "));
        info!("Fetching {date} with: {command}");
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| FetchError::Spawn {
                command: command.clone(),
                err,
            })?;
        trace!("{}", String::from_utf8_lossy(&output.stdout));
        if !output.status.success() {
            return Err(FetchError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        self.endpoint.candidates(site, date)
    }

    fn release(&self, site: Option<&SiteCode>, date: NaiveDate) -> Result<(), FetchError> {
        let files = match self.endpoint.candidates(site, date) {
            Ok(f) => f,
            // Nothing was fetched, so there's nothing to clear.
            Err(FetchError::Unavailable(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        debug!("Clearing {} fetched files for {date}", files.len());
        for f in files {
            std::fs::remove_file(&f)?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("'{}' into {}", self.program, self.endpoint.dir().display())
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("File source {0:?} is not an available directory")]
    Unavailable(PathBuf),

    #[error("The sync command is empty")]
    EmptyCommand,

    #[error("Couldn't run '{command}': {err}")]
    Spawn {
        command: String,
        err: std::io::Error,
    },

    #[error("'{command}' failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
