// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.


use std::{collections::HashMap, path::PathBuf};

use clap::Parser;
use itertools::Itertools;
use log::{debug, info};
use strum::IntoEnumIterator;

use super::common::{InfoPrinter, QUARANTINE_HELP};
use crate::{
    constants::DEFAULT_QUARANTINE_PATH,
    quarantine::{FailureReason, QuarantineEntry, QuarantineLog},
    UptimeError,
};

#[derive(Parser, Debug)]
pub(super) struct QuarantineArgs {
    #[clap(long, help = QUARANTINE_HELP.as_str())]
    quarantine_log: Option<PathBuf>,

    /// Only list files quarantined for this reason (e.g. truncated).
    #[clap(long)]
    reason: Option<String>,

    /// Only print the number of files per reason.
    #[clap(long)]
    summary: bool,
}

impl QuarantineArgs {
    pub(super) fn run(self) -> Result<(), UptimeError> {
        let path = self
            .quarantine_log
            .unwrap_or_else(|| PathBuf::from(DEFAULT_QUARANTINE_PATH));
        let reason = self.reason.as_deref().map(parse_reason).transpose()?;
        debug!("Reading quarantine log {}", path.display());
        let entries = QuarantineLog::read_entries(&path)?;
        if entries.is_empty() {
            info!("{} has no entries", path.display());
            return Ok(());
        }

        let mut printer = InfoPrinter::new(
            format!("{} quarantined files in {}", entries.len(), path.display()).into(),
        );
        printer.push_block(
            count_reasons(&entries)
                .into_iter()
                .map(|(reason, count)| format!("{reason}: {count}").into())
                .collect(),
        );
        if !self.summary {
            printer.push_block(
                entries
                    .iter()
                    .filter(|e| reason.map(|r| r == e.reason).unwrap_or(true))
                    .map(|e| {
                        format!(
                            "{} {} [{}] {}",
                            e.attempted_at.format("%Y-%m-%dT%H:%M:%SZ"),
                            e.file,
                            e.reason,
                            e.detail
                        )
                        .into()
                    })
                    .collect(),
            );
        }
        printer.display();
        Ok(())
    }
}

fn parse_reason(s: &str) -> Result<FailureReason, QuarantineArgsError> {
    FailureReason::iter()
        .find(|r| r.to_string() == s.trim().to_lowercase())
        .ok_or_else(|| QuarantineArgsError::UnknownReason {
            got: s.to_string(),
            valid: FailureReason::iter().join(", "),
        })
}

/// How many entries there are for each reason, in the order reasons are
/// declared. Reasons without entries are left out.
fn count_reasons(entries: &[QuarantineEntry]) -> Vec<(FailureReason, usize)> {
    let counts: HashMap<FailureReason, usize> = entries.iter().map(|e| e.reason).counts();
    FailureReason::iter()
        .filter_map(|r| counts.get(&r).map(|&c| (r, c)))
        .collect()
}

#[derive(thiserror::Error, Debug)]
pub(super) enum QuarantineArgsError {
    #[error("'{got}' isn't a quarantine reason; valid reasons are: {valid}")]
    UnknownReason { got: String, valid: String },
}
