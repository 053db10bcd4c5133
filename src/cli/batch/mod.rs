// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.


use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    sync::Arc,
};

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::{
    common::{
        display_warnings, parse_site, DateArg, InfoPrinter, RunOpts, SourceArgs, StoreArgs, Warn,
        WorkerArgs, ARG_FILE_HELP,
    },
    ingest::report_lines,
    stats::display_statistic,
};
use crate::{
    batch::{
        run_hooks, BatchReport, BatchRunner, CopyStore, DateRange, DayOutcome, MoveFiles,
        PostBatchHook,
    },
    config::StatsConfig,
    ingest::Ingester,
    site::SiteCode,
    stats::UptimeCalculator,
    UptimeError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct BatchArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The first day (YYYY-MM-DD) or month (YYYY-MM) to ingest.
    #[clap(long, help_heading = "DAYS")]
    pub(super) from: Option<String>,

    /// The last day (YYYY-MM-DD) or month (YYYY-MM) to ingest, inclusive.
    /// Default: the same as --from.
    #[clap(long, help_heading = "DAYS")]
    pub(super) to: Option<String>,

    /// Ingest every day of a month (YYYY-MM).
    #[clap(long, help_heading = "DAYS")]
    pub(super) month: Option<String>,

    /// Only ingest this site's files (e.g. sas). Default: all sites.
    #[clap(long, help_heading = "DAYS")]
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

    /// Also compute each ingested day's uptime statistics.
    #[clap(long, help_heading = "STATISTICS")]
    #[serde(default)]
    pub(super) with_stats: bool,

    /// The gap threshold used with --with-stats (e.g. 600, 10min). Default:
    /// 600s
    #[clap(long, help_heading = "STATISTICS")]
    pub(super) gap_threshold: Option<String>,

    /// After the batch, copy the store into this directory with a time-stamped
    /// name.
    #[clap(long, help_heading = "AFTERWARDS")]
    pub(super) copy_store_to: Option<PathBuf>,

    /// After the batch, move the quarantine log into this directory.
    #[clap(long, help_heading = "AFTERWARDS")]
    pub(super) archive_logs_to: Option<PathBuf>,

    /// Write the batch report as JSON to this file.
    #[clap(long, help_heading = "AFTERWARDS")]
    pub(super) report_json: Option<PathBuf>,
}

pub(super) struct BatchParams {
    pub(super) range: DateRange,
    pub(super) site: Option<SiteCode>,
    pub(super) runner: BatchRunner,
    pub(super) hooks: Vec<Box<dyn PostBatchHook>>,
    pub(super) report_json: Option<PathBuf>,
}

impl BatchArgs {
    pub(super) fn merge(self) -> Result<BatchArgs, UptimeError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let BatchArgs {
                args_file: _,
                from,
                to,
                month,
                site,
                source_args,
                store_args,
                worker_args,
                with_stats,
                gap_threshold,
                copy_store_to,
                archive_logs_to,
                report_json,
            } = unpack_arg_file!(arg_file);

            Ok(BatchArgs {
                args_file: None,
                from: cli_args.from.or(from),
                to: cli_args.to.or(to),
                month: cli_args.month.or(month),
                site: cli_args.site.or(site),
                source_args: cli_args.source_args.merge(source_args),
                store_args: cli_args.store_args.merge(store_args),
                worker_args: cli_args.worker_args.merge(worker_args),
                with_stats: cli_args.with_stats || with_stats,
                gap_threshold: cli_args.gap_threshold.or(gap_threshold),
                copy_store_to: cli_args.copy_store_to.or(copy_store_to),
                archive_logs_to: cli_args.archive_logs_to.or(archive_logs_to),
                report_json: cli_args.report_json.or(report_json),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self, show_progress: bool) -> Result<BatchParams, UptimeError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            from,
            to,
            month,
            site,
            source_args,
            store_args,
            worker_args,
            with_stats,
            gap_threshold,
            copy_store_to,
            archive_logs_to,
            report_json,
        } = self;

        let range = match (from, to, month) {
            (None, None, Some(month)) => {
                let (year, month) = DateArg::month(&month)?;
                DateRange::month(year, month)?
            }
            (Some(from), to, None) => parse_range(&from, to.as_deref())?,
            (None, None, None) => return Err(BatchArgsError::NoDays.into()),
            (None, Some(_), None) => return Err(BatchArgsError::ToWithoutFrom.into()),
            _ => return Err(BatchArgsError::MonthAndRange.into()),
        };
        let site = parse_site(site.as_deref())?.site().cloned();

        let source = source_args.parse()?.ok_or(BatchArgsError::NoEndpoint)?;
        let (config, decoder) = worker_args.parse(show_progress)?;
        let stats_config = match gap_threshold {
            Some(s) => {
                if !with_stats {
                    "--gap-threshold does nothing without --with-stats".warn();
                }
                StatsConfig::from_threshold_str(&s)?
            }
            None => StatsConfig::default(),
        };
        let (store, quarantine) = store_args.open()?;

        let mut hooks: Vec<Box<dyn PostBatchHook>> = vec![];
        if let Some(dest_dir) = copy_store_to {
            hooks.push(Box::new(CopyStore {
                store: Arc::clone(&store),
                dest_dir,
            }));
        }
        if let Some(dest_dir) = archive_logs_to {
            hooks.push(Box::new(MoveFiles {
                files: vec![quarantine.path().to_path_buf()],
                dest_dir,
            }));
        }

        let mut printer = InfoPrinter::new(format!("Batch over {range}").into());
        printer.push_block(vec![
            format!("{} days", range.num_days()).into(),
            match &site {
                Some(site) => format!("Site: {site}").into(),
                None => "All sites".into(),
            },
            format!("Files from {}", source.describe()).into(),
        ]);
        printer.push_block(vec![
            format!("Store:      {}", store_args.store_path().display()).into(),
            format!("Quarantine: {}", quarantine.path().display()).into(),
        ]);
        if with_stats {
            printer.push_line(
                format!(
                    "Daily statistics with a {}s gap threshold",
                    stats_config.gap_threshold_secs()
                )
                .into(),
            );
        }
        printer.push_block(
            hooks
                .iter()
                .map(|h| format!("Afterwards: {}", h.name()).into())
                .collect(),
        );
        printer.display();
        display_warnings();

        let ingester =
            Ingester::new(config, Arc::clone(&store), quarantine, decoder).with_source(source);
        let mut runner = BatchRunner::new(ingester);
        if with_stats {
            runner = runner.with_stats(UptimeCalculator::new(store, stats_config));
        }

        Ok(BatchParams {
            range,
            site,
            runner,
            hooks,
            report_json,
        })
    }

    pub(super) fn run(self, opts: &RunOpts) -> Result<(), UptimeError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let BatchParams {
            range,
            site,
            runner,
            hooks,
            report_json,
        } = self.parse(opts.progress_bars)?;

        if opts.dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let report = runner.run_scope_with_cancel(&range, site.as_ref(), &opts.cancel)?;
        // Let go of the store and quarantine log before the hooks move them
        // around.
        drop(runner);
        display_report(&report);

        if let Some(path) = report_json {
            let mut f = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(&mut f, &report)
                .map_err(|e| UptimeError::Generic(e.to_string()))?;
            f.flush()?;
            info!("Wrote the batch report to {}", path.display());
        }

        if report.cancelled && !hooks.is_empty() {
            "The batch was cancelled; not running the post-batch hooks".warn();
        } else {
            for (name, e) in run_hooks(&hooks, &report) {
                format!("Post-batch hook '{name}' failed: {e}").warn();
            }
        }
        display_warnings();
        Ok(())
    }
}

/// A range from --from and --to, each a day or a month. A month as --from
/// starts on its first day; as --to, it ends on its last day.
fn parse_range(from: &str, to: Option<&str>) -> Result<DateRange, UptimeError> {
    let from = DateArg::parse(from)?;
    let to = match to {
        Some(to) => DateArg::parse(to)?,
        None => from,
    };
    let range = match (from, to) {
        (DateArg::Day(first), DateArg::Day(last)) => DateRange::new(first, last)?,
        (
            DateArg::Month { year, month },
            DateArg::Month {
                year: last_year,
                month: last_month,
            },
        ) => DateRange::months((year, month), (last_year, last_month))?,
        (DateArg::Day(first), DateArg::Month { year, month }) => {
            DateRange::new(first, DateRange::month(year, month)?.last())?
        }
        (DateArg::Month { year, month }, DateArg::Day(last)) => {
            DateRange::new(DateRange::month(year, month)?.first(), last)?
        }
    };
    Ok(range)
}

fn display_report(report: &BatchReport) {
    let mut printer = InfoPrinter::new(
        format!(
            "Batch over {}: {} of {} days completed{}",
            report.range,
            report.completed_days(),
            report.range.num_days(),
            if report.cancelled { " (cancelled)" } else { "" }
        )
        .into(),
    );
    printer.push_block(report_lines(&report.totals));
    printer.push_block(
        report
            .skipped_days()
            .map(|(date, reason)| format!("Skipped {date}: {reason}").into())
            .collect(),
    );
    printer.display();

    for day in &report.days {
        if let DayOutcome::Completed {
            stats, stats_error, ..
        } = &day.outcome
        {
            if let Some(stat) = stats {
                display_statistic(stat);
            }
            if let Some(e) = stats_error {
                format!("No statistics for {}: {e}", day.date).warn();
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub(super) enum BatchArgsError {
    #[error("No days given; supply --month, or --from (and optionally --to)")]
    NoDays,

    #[error("--to was given without --from")]
    ToWithoutFrom,

    #[error("--month can't be used with --from or --to")]
    MonthAndRange,

    #[error("A batch needs an --endpoint to find files in")]
    NoEndpoint,
}
