// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Session records: the metadata of one rawacf file.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    quarantine::FailureReason,
    site::{SiteCode, SiteCodeError},
};

/// Parameters of the experiment that produced a file. These are carried along
/// with a session but never used for uptime statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExperimentParams {
    /// Numeric station ID.
    pub stid: i32,

    /// Control program ID.
    pub cpid: i32,

    pub cmd_name: String,
    pub cmd_args: String,

    /// The smallest number of averages of any record.
    pub min_nave: i32,

    /// Were consecutive records always close together in time?
    pub times_consistent: bool,

    /// Did the records pass the data-anomaly checks? Anomalous files are still
    /// stored, but flagged.
    pub data_consistent: bool,

    /// Transmit frequency range \[kHz\].
    pub min_tfreq: i32,
    pub max_tfreq: i32,

    /// Were cross-correlations computed?
    pub xcf: i32,
}

/// What a decoder hands back for a file, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSession {
    pub site: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub experiment: ExperimentParams,
}

impl DecodedSession {
    /// Check that the session is sane and turn it into a storable record.
    pub fn validate(self, source_file: &Path) -> Result<SessionRecord, ValidationError> {
        let site = SiteCode::new(&self.site)?;
        if self.end < self.start {
            return Err(ValidationError::EndBeforeStart {
                start: self.start,
                end: self.end,
            });
        }
        Ok(SessionRecord {
            site,
            start: self.start,
            end: self.end,
            source_file: source_file.display().to_string(),
            experiment: self.experiment,
        })
    }
}

/// One stored session. `(site, start)` is unique within a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub site: SiteCode,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source_file: String,
    pub experiment: ExperimentParams,
}

impl SessionRecord {
    pub fn duration_seconds(&self) -> i64 {
        self.end.timestamp() - self.start.timestamp()
    }
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Session ends ({end}) before it starts ({start})")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error(transparent)]
    BadSiteCode(#[from] SiteCodeError),
}

impl ValidationError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ValidationError::EndBeforeStart { .. } => FailureReason::EndBeforeStart,
            ValidationError::BadSiteCode(_) => FailureReason::BadSiteCode,
        }
    }
}
