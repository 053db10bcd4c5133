// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Common arguments for command-line interfaces. e.g. `ingest` and `batch`
//! both write to a store and decode files with workers, so those arguments
//! are shared between them.

mod printers;
#[cfg(test)]
mod tests;

pub(super) use printers::InfoPrinter;
pub(crate) use printers::{display_warnings, Warn};

use std::{path::PathBuf, sync::Arc};

use chrono::NaiveDate;
use clap::Parser;
use crossbeam_utils::atomic::AtomicCell;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::{
    config::{ConfigError, IngestConfig},
    constants::{DEFAULT_BZ2_DECOMPRESSOR, DEFAULT_QUARANTINE_PATH, DEFAULT_STORE_PATH},
    decode::{DmapDecoder, SessionDecode},
    fetch::{FetchError, FileSource, LocalArchive, SyncCommand},
    quarantine::{QuarantineError, QuarantineLog},
    site::{SiteCodeError, SiteSelection},
    store::{MetadataStore, StoreError},
};

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);

    pub(super) static ref STORE_HELP: String =
        format!("Path to the session store. Default: {DEFAULT_STORE_PATH}");

    pub(super) static ref QUARANTINE_HELP: String =
        format!("Path to the quarantine log. Default: {DEFAULT_QUARANTINE_PATH}");

    pub(super) static ref BZ2_HELP: String =
        format!("The command used to decompress .bz2 files; the file path is appended and the decompressed bytes are read from stdout. Default: '{DEFAULT_BZ2_DECOMPRESSOR}'");

    static ref DATE_REGEX: Regex =
        Regex::new(r"^(\d{4})-(\d{1,2})(?:-(\d{1,2}))?$").expect("date regex is valid");
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

macro_rules! unpack_arg_file {
    ($arg_file:expr) => ({
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::common::{ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED};

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(UptimeError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match serde_json::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(UptimeError::ArgFile(format!(
                            "Couldn't decode json structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }

            _ => {
                return Err(UptimeError::ArgFile(format!(
                    "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}", $arg_file, *ARG_FILE_TYPES_COMMA_SEPARATED)
                ))
            }
        }
    });
}

/// Things every subcommand's `run` gets from the global arguments.
pub(super) struct RunOpts {
    pub(super) dry_run: bool,
    pub(super) progress_bars: bool,

    /// Set when the user asks us to stop (e.g. Ctrl-C).
    pub(super) cancel: Arc<AtomicCell<bool>>,
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct StoreArgs {
    #[clap(long, help = STORE_HELP.as_str(), help_heading = "STORE")]
    pub(super) store: Option<PathBuf>,

    #[clap(long, help = QUARANTINE_HELP.as_str(), help_heading = "STORE")]
    pub(super) quarantine_log: Option<PathBuf>,
}

impl StoreArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            store: self.store.or(other.store),
            quarantine_log: self.quarantine_log.or(other.quarantine_log),
        }
    }

    pub(super) fn store_path(&self) -> PathBuf {
        self.store
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }

    pub(super) fn quarantine_path(&self) -> PathBuf {
        self.quarantine_log
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_QUARANTINE_PATH))
    }

    pub(super) fn open(&self) -> Result<(Arc<MetadataStore>, Arc<QuarantineLog>), StoreArgsError> {
        let store = MetadataStore::open(self.store_path())?;
        let quarantine = QuarantineLog::open(self.quarantine_path())?;
        Ok((Arc::new(store), Arc::new(quarantine)))
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct WorkerArgs {
    /// The number of files to decode at once. Default: the number of CPUs.
    #[clap(short = 'j', long, help_heading = "DECODING")]
    pub(super) num_workers: Option<usize>,

    /// Give up on a file whose decode takes longer than this (e.g. 90s, 5min).
    /// The file is quarantined and the batch moves on. Default: no timeout.
    #[clap(long, help_heading = "DECODING")]
    pub(super) file_timeout: Option<String>,

    /// The number of sessions written to the store per transaction.
    #[clap(long, help_heading = "DECODING")]
    pub(super) write_batch_size: Option<usize>,

    #[clap(long, help = BZ2_HELP.as_str(), help_heading = "DECODING")]
    pub(super) bz2_command: Option<String>,
}

impl WorkerArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            num_workers: self.num_workers.or(other.num_workers),
            file_timeout: self.file_timeout.or(other.file_timeout),
            write_batch_size: self.write_batch_size.or(other.write_batch_size),
            bz2_command: self.bz2_command.or(other.bz2_command),
        }
    }

    pub(super) fn parse(
        &self,
        show_progress: bool,
    ) -> Result<(IngestConfig, Arc<dyn SessionDecode>), ConfigError> {
        let config = IngestConfig::from_strs(
            self.num_workers,
            self.file_timeout.as_deref(),
            self.write_batch_size,
            show_progress,
        )?;
        let decoder = match self.bz2_command.as_deref() {
            Some(c) => DmapDecoder::new(Some(c)),
            None => DmapDecoder::default(),
        };
        Ok((config, Arc::new(decoder)))
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SourceArgs {
    /// The directory holding rawacf files, named like
    /// 20170328.0001.00.sas.rawacf.bz2. With --sync-command, files are fetched
    /// into this directory first.
    #[clap(long, help_heading = "FILE SOURCE")]
    pub(super) endpoint: Option<PathBuf>,

    /// A program that fetches a day's files into the endpoint. These
    /// placeholders are substituted: {year}, {month}, {pattern} (e.g.
    /// 20170328*sas) and {endpoint}. Fetched files are deleted after they are
    /// ingested.
    #[clap(long, help_heading = "FILE SOURCE")]
    pub(super) sync_command: Option<String>,
}

impl SourceArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            endpoint: self.endpoint.or(other.endpoint),
            sync_command: self.sync_command.or(other.sync_command),
        }
    }

    /// `None` if no endpoint was given.
    pub(super) fn parse(&self) -> Result<Option<Arc<dyn FileSource>>, FetchError> {
        let endpoint = match &self.endpoint {
            Some(e) => e.clone(),
            None => {
                if self.sync_command.is_some() {
                    "--sync-command was given without --endpoint; ignoring it".warn();
                }
                return Ok(None);
            }
        };
        let source: Arc<dyn FileSource> = match self.sync_command.as_deref() {
            Some(command) => Arc::new(SyncCommand::new(command, endpoint)?),
            None => Arc::new(LocalArchive::new(endpoint)),
        };
        Ok(Some(source))
    }
}

/// A date given on the command line, either a day (2017-03-28) or a month
/// (2017-03).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DateArg {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
}

impl DateArg {
    pub(super) fn parse(s: &str) -> Result<DateArg, DateArgError> {
        let caps = DATE_REGEX
            .captures(s.trim())
            .ok_or_else(|| DateArgError::Unparsable(s.to_string()))?;
        let number = |i: usize| caps.get(i).map(|m| m.as_str().parse::<u32>());
        let invalid = || DateArgError::Invalid(s.to_string());
        let year = match number(1) {
            Some(Ok(y)) => y as i32,
            _ => return Err(invalid()),
        };
        let month = match number(2) {
            Some(Ok(m)) if (1..=12).contains(&m) => m,
            _ => return Err(invalid()),
        };
        match number(3) {
            None => Ok(DateArg::Month { year, month }),
            Some(Ok(day)) => NaiveDate::from_ymd_opt(year, month, day)
                .map(DateArg::Day)
                .ok_or_else(invalid),
            Some(Err(_)) => Err(invalid()),
        }
    }

    pub(super) fn day(s: &str) -> Result<NaiveDate, DateArgError> {
        match DateArg::parse(s)? {
            DateArg::Day(d) => Ok(d),
            DateArg::Month { .. } => Err(DateArgError::WantedDay(s.to_string())),
        }
    }

    pub(super) fn month(s: &str) -> Result<(i32, u32), DateArgError> {
        match DateArg::parse(s)? {
            DateArg::Month { year, month } => Ok((year, month)),
            DateArg::Day(_) => Err(DateArgError::WantedMonth(s.to_string())),
        }
    }
}

/// Parse a site code, or "all".
pub(super) fn parse_site(site: Option<&str>) -> Result<SiteSelection, SiteCodeError> {
    match site {
        Some(s) => s.parse(),
        None => Ok(SiteSelection::All),
    }
}

#[derive(Error, Debug)]
pub(super) enum DateArgError {
    #[error("Couldn't parse '{0}' as a date; expected YYYY-MM-DD or YYYY-MM")]
    Unparsable(String),

    #[error("'{0}' is not a real date")]
    Invalid(String),

    #[error("Expected a day (YYYY-MM-DD), but got '{0}'")]
    WantedDay(String),

    #[error("Expected a month (YYYY-MM), but got '{0}'")]
    WantedMonth(String),
}

#[derive(Error, Debug)]
pub(super) enum StoreArgsError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Quarantine(#[from] QuarantineError),
}
