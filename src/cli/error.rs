// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all rawacf-uptime-related errors. This should be the *only*
//! error enum that is publicly visible.

use thiserror::Error;

use super::{
    batch::BatchArgsError,
    common::{DateArgError, StoreArgsError},
    ingest::IngestArgsError,
    quarantine::QuarantineArgsError,
    stats::StatsArgsError,
};
use crate::{
    batch::BatchError,
    config::ConfigError,
    fetch::FetchError,
    ingest::IngestError,
    quarantine::QuarantineError,
    site::SiteCodeError,
    stats::StatsError,
    store::StoreError,
    unit_parsing::UnitParseError,
    window::WindowError,
};

const HELP: &str = "Run with --help to see the available arguments.";

/// The *only* publicly visible error from rawacf-uptime.
#[derive(Error, Debug)]
pub enum UptimeError {
    /// An error related to argument files.
    #[error("{0}\n\nArgument files are TOML or JSON with the same keys as the long command-line arguments.")]
    ArgFile(String),

    /// A bad argument or configuration value. Nothing has been done yet.
    #[error("{0}\n\n{HELP}")]
    Config(String),

    /// An error with the session store.
    #[error("Session store error: {0}")]
    Store(String),

    /// An error with the quarantine log.
    #[error("Quarantine log error: {0}")]
    Quarantine(String),

    /// Files couldn't be obtained for a scope.
    #[error("{0}\n\nCheck the --endpoint and --sync-command arguments.")]
    Fetch(String),

    /// An error that stopped an ingestion scope.
    #[error("{0}")]
    Ingest(String),

    /// An error while computing statistics.
    #[error("{0}")]
    Stats(String),

    /// An error that stopped a batch before it started.
    #[error("{0}")]
    Batch(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

// Binary sub-command errors.

impl From<IngestArgsError> for UptimeError {
    fn from(e: IngestArgsError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<StatsArgsError> for UptimeError {
    fn from(e: StatsArgsError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<BatchArgsError> for UptimeError {
    fn from(e: BatchArgsError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<QuarantineArgsError> for UptimeError {
    fn from(e: QuarantineArgsError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<DateArgError> for UptimeError {
    fn from(e: DateArgError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<StoreArgsError> for UptimeError {
    fn from(e: StoreArgsError) -> Self {
        match e {
            StoreArgsError::Store(e) => Self::from(e),
            StoreArgsError::Quarantine(e) => Self::from(e),
        }
    }
}

// Library code errors.

impl From<ConfigError> for UptimeError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<UnitParseError> for UptimeError {
    fn from(e: UnitParseError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<SiteCodeError> for UptimeError {
    fn from(e: SiteCodeError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<WindowError> for UptimeError {
    fn from(e: WindowError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<StoreError> for UptimeError {
    fn from(e: StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<QuarantineError> for UptimeError {
    fn from(e: QuarantineError) -> Self {
        Self::Quarantine(e.to_string())
    }
}

impl From<FetchError> for UptimeError {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e.to_string())
    }
}

impl From<IngestError> for UptimeError {
    fn from(e: IngestError) -> Self {
        let s = e.to_string();
        match e {
            IngestError::Fetch(e) => Self::from(e),
            IngestError::Store(e) => Self::from(e),
            IngestError::Quarantine(e) => Self::from(e),
            IngestError::ScopeUnavailable(_) | IngestError::NoFileSource => Self::Config(s),
            IngestError::WorkerPanicked(_) => Self::Ingest(s),
            IngestError::IO(e) => Self::from(e),
        }
    }
}

impl From<StatsError> for UptimeError {
    fn from(e: StatsError) -> Self {
        match e {
            StatsError::Store(e) => Self::from(e),
            StatsError::Window(e) => Self::from(e),
        }
    }
}

impl From<BatchError> for UptimeError {
    fn from(e: BatchError) -> Self {
        let s = e.to_string();
        match e {
            BatchError::BackwardsRange { .. } | BatchError::Window(_) => Self::Config(s),
            BatchError::NoFileSource => Self::Batch(s),
        }
    }
}

impl From<std::io::Error> for UptimeError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
