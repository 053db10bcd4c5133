// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests;

use std::{borrow::Cow, path::PathBuf};

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, parse_site, DateArg, InfoPrinter, RunOpts, SourceArgs, StoreArgs, Warn,
    WorkerArgs, ARG_FILE_HELP,
};
use crate::{
    ingest::{IngestReport, IngestScope, Ingester},
    UptimeError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct IngestArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// A single rawacf file to ingest.
    #[clap(long, help_heading = "SCOPE")]
    pub(super) file: Option<PathBuf>,

    /// Ingest every rawacf file directly inside this directory.
    #[clap(long, help_heading = "SCOPE")]
    pub(super) dir: Option<PathBuf>,

    /// Ingest a day (YYYY-MM-DD) of files from the --endpoint.
    #[clap(long, help_heading = "SCOPE")]
    pub(super) date: Option<String>,

    /// With --date, only ingest this site's files (e.g. sas). Default: all
    /// sites.
    #[clap(long, help_heading = "SCOPE")]
    pub(super) site: Option<String>,

    #[clap(flatten)]
    #[serde(rename = "source")]
    #[serde(default)]
    pub(super) source_args: SourceArgs,

    #[clap(flatten)]
    #[serde(rename = "store")]
    #[serde(default)]
    pub(super) store_args: StoreArgs,

    #[clap(flatten)]
    #[serde(rename = "decoding")]
    #[serde(default)]
    pub(super) worker_args: WorkerArgs,
}

pub(super) struct IngestParams {
    pub(super) scope: IngestScope,
    pub(super) ingester: Ingester,
}

impl IngestArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified
    /// into a single struct. Where applicable, it will prefer CLI parameters
    /// over those in the file.
    pub(super) fn merge(self) -> Result<IngestArgs, UptimeError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let IngestArgs {
                args_file: _,
                file,
                dir,
                date,
                site,
                source_args,
                store_args,
                worker_args,
            } = unpack_arg_file!(arg_file);

            Ok(IngestArgs {
                args_file: None,
                file: cli_args.file.or(file),
                dir: cli_args.dir.or(dir),
                date: cli_args.date.or(date),
                site: cli_args.site.or(site),
                source_args: cli_args.source_args.merge(source_args),
                store_args: cli_args.store_args.merge(store_args),
                worker_args: cli_args.worker_args.merge(worker_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self, show_progress: bool) -> Result<IngestParams, UptimeError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            file,
            dir,
            date,
            site,
            source_args,
            store_args,
            worker_args,
        } = self;

        let scope = match (file, dir, date) {
            (Some(file), None, None) => IngestScope::File(file),
            (None, Some(dir), None) => IngestScope::Directory(dir),
            (None, None, Some(date)) => IngestScope::Day {
                date: DateArg::day(&date)?,
                site: parse_site(site.as_deref())?.site().cloned(),
            },
            (None, None, None) => return Err(IngestArgsError::NoScope.into()),
            _ => return Err(IngestArgsError::MultipleScopes.into()),
        };
        if site.is_some() && !matches!(scope, IngestScope::Day { .. }) {
            "--site only applies to --date; ignoring it".warn();
        }

        let source = source_args.parse()?;
        if matches!(scope, IngestScope::Day { .. }) && source.is_none() {
            return Err(IngestArgsError::NoEndpoint.into());
        }
        let (config, decoder) = worker_args.parse(show_progress)?;
        let (store, quarantine) = store_args.open()?;

        let mut printer = InfoPrinter::new(format!("Ingesting {scope}").into());
        printer.push_block(vec![
            format!("Store:      {}", store_args.store_path().display()).into(),
            format!("Quarantine: {}", quarantine.path().display()).into(),
        ]);
        if let Some(source) = &source {
            printer.push_line(format!("Files from {}", source.describe()).into());
        }
        printer.push_block(vec![
            format!("{} decode workers", config.num_workers).into(),
            match config.file_timeout {
                Some(t) => format!("Per-file timeout: {}s", t.as_secs_f64()).into(),
                None => "No per-file timeout".into(),
            },
        ]);
        printer.display();
        display_warnings();

        let mut ingester = Ingester::new(config, store, quarantine, decoder);
        if let Some(source) = source {
            ingester = ingester.with_source(source);
        }
        Ok(IngestParams { scope, ingester })
    }

    pub(super) fn run(self, opts: &RunOpts) -> Result<(), UptimeError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let IngestParams { scope, ingester } = self.parse(opts.progress_bars)?;

        if opts.dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let report = ingester.ingest_with_cancel(&scope, &opts.cancel)?;
        let mut printer = InfoPrinter::new(format!("Ingested {scope}").into());
        printer.push_block(report_lines(&report));
        printer.display();
        Ok(())
    }
}

/// Lines summarising an ingestion report.
pub(super) fn report_lines(report: &IngestReport) -> Vec<Cow<'static, str>> {
    let mut lines: Vec<Cow<'static, str>> = vec![
        format!(
            "{} of {} candidate files processed",
            report.processed(),
            report.candidates
        )
        .into(),
        format!(
            "{} new sessions, {} already stored",
            report.ingested, report.duplicate
        )
        .into(),
    ];
    if report.anomalous > 0 {
        lines.push(format!("{} sessions have inconsistent data", report.anomalous).into());
    }
    if report.quarantined > 0 {
        lines.push(format!("{} files quarantined", report.quarantined).into());
    }
    if report.skipped > 0 {
        lines.push(format!("{} files weren't rawacf files", report.skipped).into());
    }
    for stuck in &report.stuck {
        lines.push(format!("Timed out: {}", stuck.display()).into());
    }
    if report.cancelled {
        lines.push("Cancelled before every file was processed".into());
    }
    lines
}

#[derive(thiserror::Error, Debug)]
pub(super) enum IngestArgsError {
    #[error("Nothing to ingest; supply one of --file, --dir or --date")]
    NoScope,

    #[error("Only one of --file, --dir and --date may be given")]
    MultipleScopes,

    #[error("--date needs an --endpoint to find files in")]
    NoEndpoint,
}
