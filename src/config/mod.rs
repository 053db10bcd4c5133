// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Explicit configuration values for ingestion and statistics.
//!
//! Nothing here is process-wide; a config is built once (usually from CLI
//! arguments) and handed to the constructors that need it.

mod error;

pub use error::ConfigError;

use std::{num::NonZeroUsize, thread, time::Duration};

use crate::{
    constants::{DEFAULT_GAP_THRESHOLD_SECS, DEFAULT_WRITE_BATCH_SIZE},
    unit_parsing::parse_duration,
};

/// How ingestion work is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// The number of decode workers.
    pub num_workers: NonZeroUsize,

    /// If set, a file whose decode takes longer than this is quarantined with
    /// reason `timeout` and the worker moves on.
    pub file_timeout: Option<Duration>,

    /// The number of sessions written to the store per transaction.
    pub write_batch_size: NonZeroUsize,

    pub show_progress: bool,
}

impl IngestConfig {
    /// Validate raw values. `None` takes the documented default; a zero is an
    /// error, never silently replaced.
    pub fn new(
        num_workers: Option<usize>,
        file_timeout: Option<Duration>,
        write_batch_size: Option<usize>,
        show_progress: bool,
    ) -> Result<IngestConfig, ConfigError> {
        let num_workers = match num_workers {
            Some(n) => NonZeroUsize::new(n).ok_or(ConfigError::ZeroWorkers)?,
            None => default_num_workers(),
        };
        if file_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        let write_batch_size = match write_batch_size {
            Some(n) => NonZeroUsize::new(n).ok_or(ConfigError::ZeroBatchSize)?,
            None => default_write_batch_size(),
        };
        Ok(IngestConfig {
            num_workers,
            file_timeout,
            write_batch_size,
            show_progress,
        })
    }

    /// Like [`IngestConfig::new`], but the timeout is a string with an
    /// optional time unit (e.g. "90s", "5min").
    pub fn from_strs(
        num_workers: Option<usize>,
        file_timeout: Option<&str>,
        write_batch_size: Option<usize>,
        show_progress: bool,
    ) -> Result<IngestConfig, ConfigError> {
        let file_timeout = file_timeout
            .map(|s| {
                parse_duration(s).map_err(|source| ConfigError::Timeout {
                    input: s.to_string(),
                    source,
                })
            })
            .transpose()?;
        Self::new(num_workers, file_timeout, write_batch_size, show_progress)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            num_workers: default_num_workers(),
            file_timeout: None,
            write_batch_size: default_write_batch_size(),
            show_progress: false,
        }
    }
}

fn default_num_workers() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

fn default_write_batch_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_WRITE_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN)
}

/// How uptime statistics are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsConfig {
    gap_threshold: Duration,
}

impl StatsConfig {
    /// Sub-second thresholds are rounded down; sessions are stored at
    /// one-second resolution.
    pub fn new(gap_threshold: Duration) -> StatsConfig {
        StatsConfig {
            gap_threshold: Duration::from_secs(gap_threshold.as_secs()),
        }
    }

    /// Parse a gap threshold like "600", "10min" or "0.5h".
    pub fn from_threshold_str(s: &str) -> Result<StatsConfig, ConfigError> {
        let gap_threshold = parse_duration(s).map_err(|source| ConfigError::GapThreshold {
            input: s.to_string(),
            source,
        })?;
        Ok(Self::new(gap_threshold))
    }

    pub fn gap_threshold(&self) -> Duration {
        self.gap_threshold
    }

    pub fn gap_threshold_secs(&self) -> i64 {
        i64::try_from(self.gap_threshold.as_secs()).unwrap_or(i64::MAX)
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            gap_threshold: Duration::from_secs(DEFAULT_GAP_THRESHOLD_SECS),
        }
    }
}
