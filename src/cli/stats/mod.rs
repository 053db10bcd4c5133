// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.


use std::{borrow::Cow, path::PathBuf, sync::Arc};

use chrono::NaiveDate;
use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, parse_site, DateArg, InfoPrinter, RunOpts, ARG_FILE_HELP, STORE_HELP,
};
use crate::{
    config::StatsConfig,
    constants::{DEFAULT_GAP_THRESHOLD_SECS, DEFAULT_STORE_PATH},
    site::SiteSelection,
    stats::{UptimeCalculator, UptimeStatistic},
    store::MetadataStore,
    UptimeError,
};

lazy_static::lazy_static! {
    static ref GAP_THRESHOLD_HELP: String =
        format!("Sessions separated by no more than this are counted as one stretch of operation (e.g. 600, 10min). Default: {DEFAULT_GAP_THRESHOLD_SECS}s");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct StatsArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// Statistics for a single day (YYYY-MM-DD).
    #[clap(long, help_heading = "PERIOD")]
    pub(super) date: Option<String>,

    /// Statistics for a calendar month (YYYY-MM), with a breakdown per day.
    #[clap(long, help_heading = "PERIOD")]
    pub(super) month: Option<String>,

    /// The first day (YYYY-MM-DD) of a range of days. Needs --to.
    #[clap(long, help_heading = "PERIOD")]
    pub(super) from: Option<String>,

    /// The last day (YYYY-MM-DD, inclusive) of a range of days. Needs --from.
    #[clap(long, help_heading = "PERIOD")]
    pub(super) to: Option<String>,

    /// The site to report on (e.g. sas), or "all" for every site in the
    /// store. Default: all
    #[clap(long)]
    pub(super) site: Option<String>,

    #[clap(long, help = GAP_THRESHOLD_HELP.as_str())]
    pub(super) gap_threshold: Option<String>,

    #[clap(long, help = STORE_HELP.as_str())]
    pub(super) store: Option<PathBuf>,

    /// Print the statistics as JSON on stdout. Log messages go to stderr.
    #[clap(long)]
    #[serde(default)]
    pub(super) json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Period {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
    Range { first: NaiveDate, last: NaiveDate },
}

pub(super) struct StatsParams {
    pub(super) calculator: UptimeCalculator,
    pub(super) selection: SiteSelection,
    pub(super) period: Period,
    pub(super) json: bool,
}

impl StatsParams {
    pub(super) fn compute(&self) -> Result<UptimeStatistic, UptimeError> {
        let stat = match self.period {
            Period::Day(date) => self.calculator.stats_for_day(&self.selection, date)?,
            Period::Month { year, month } => {
                self.calculator
                    .stats_for_month(&self.selection, year, month)?
            }
            Period::Range { first, last } => {
                self.calculator
                    .stats_for_range(&self.selection, first, last)?
            }
        };
        Ok(stat)
    }
}

impl StatsArgs {
    pub(super) fn merge(self) -> Result<StatsArgs, UptimeError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let StatsArgs {
                args_file: _,
                date,
                month,
                from,
                to,
                site,
                gap_threshold,
                store,
                json,
            } = unpack_arg_file!(arg_file);

            Ok(StatsArgs {
                args_file: None,
                date: cli_args.date.or(date),
                month: cli_args.month.or(month),
                from: cli_args.from.or(from),
                to: cli_args.to.or(to),
                site: cli_args.site.or(site),
                gap_threshold: cli_args.gap_threshold.or(gap_threshold),
                store: cli_args.store.or(store),
                json: cli_args.json || json,
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self) -> Result<StatsParams, UptimeError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            date,
            month,
            from,
            to,
            site,
            gap_threshold,
            store,
            json,
        } = self;

        let period = match (date, month, from, to) {
            (Some(date), None, None, None) => Period::Day(DateArg::day(&date)?),
            (None, Some(month), None, None) => {
                let (year, month) = DateArg::month(&month)?;
                Period::Month { year, month }
            }
            (None, None, Some(first), Some(last)) => {
                let first = DateArg::day(&first)?;
                let last = DateArg::day(&last)?;
                if last < first {
                    return Err(StatsArgsError::BackwardsRange { first, last }.into());
                }
                Period::Range { first, last }
            }
            (None, None, None, None) => return Err(StatsArgsError::NoPeriod.into()),
            (None, None, _, _) => return Err(StatsArgsError::HalfARange.into()),
            _ => return Err(StatsArgsError::MultiplePeriods.into()),
        };
        let selection = parse_site(site.as_deref())?;
        let config = match gap_threshold {
            Some(s) => StatsConfig::from_threshold_str(&s)?,
            None => StatsConfig::default(),
        };

        let store_path = store.unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
        // Opening a store creates it; there's nothing to report on in a new
        // one.
        if !store_path.exists() {
            return Err(StatsArgsError::NoStore(store_path).into());
        }
        let store = MetadataStore::open(&store_path)?;

        let mut printer = InfoPrinter::new("Uptime statistics".into());
        printer.push_block(vec![
            format!("Store: {}", store_path.display()).into(),
            format!("Site:  {selection}").into(),
            format!("Gap threshold: {}s", config.gap_threshold_secs()).into(),
        ]);
        printer.display();
        display_warnings();

        Ok(StatsParams {
            calculator: UptimeCalculator::new(Arc::new(store), config),
            selection,
            period,
            json,
        })
    }

    pub(super) fn run(self, opts: &RunOpts) -> Result<(), UptimeError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;

        if opts.dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let stat = params.compute()?;
        if params.json {
            let s = serde_json::to_string_pretty(&stat)
                .map_err(|e| UptimeError::Generic(e.to_string()))?;
            println!("{s}");
        } else {
            display_statistic(&stat);
        }
        Ok(())
    }
}

/// Print a statistic and its per-site and per-day breakdowns.
pub(super) fn display_statistic(stat: &UptimeStatistic) {
    let mut printer = InfoPrinter::new(
        format!(
            "{} from {} to {}",
            stat.selection, stat.window_start, stat.window_end
        )
        .into(),
    );
    printer.push_block(summary_lines(stat));
    printer.push_block(
        stat.per_site
            .iter()
            .map(|s| one_line(&s.selection, s))
            .collect(),
    );
    printer.push_block(
        stat.per_day
            .iter()
            .map(|s| one_line(&s.window_start.format("%Y-%m-%d").to_string(), s))
            .collect(),
    );
    printer.display();
}

pub(super) fn summary_lines(stat: &UptimeStatistic) -> Vec<Cow<'static, str>> {
    vec![
        format!(
            "Active {} of {} ({:.2}% duty cycle)",
            format_secs(stat.active_seconds),
            format_secs(stat.window_seconds),
            stat.duty_cycle * 100.0
        )
        .into(),
        match stat.gap_count {
            0 => "No gaps".into(),
            n => format!(
                "{n} gap{}, the longest {}",
                if n == 1 { "" } else { "s" },
                format_secs(stat.longest_gap_seconds)
            )
            .into(),
        },
    ]
}

fn one_line(label: &str, stat: &UptimeStatistic) -> Cow<'static, str> {
    format!(
        "{label}: {:6.2}% ({} active, {} gaps)",
        stat.duty_cycle * 100.0,
        format_secs(stat.active_seconds),
        stat.gap_count
    )
    .into()
}

/// e.g. "4h 30m", "1h 0m 5s", "0s".
pub(super) fn format_secs(secs: i64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m, s) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, m, 0) => format!("{h}h {m}m"),
        (h, m, s) => format!("{h}h {m}m {s}s"),
    }
}

#[derive(thiserror::Error, Debug)]
pub(super) enum StatsArgsError {
    #[error("No period given; supply --date, --month, or --from and --to")]
    NoPeriod,

    #[error("Only one of --date, --month and --from/--to may be given")]
    MultiplePeriods,

    #[error("A range of days needs both --from and --to")]
    HalfARange,

    #[error("--to ({last}) is before --from ({first})")]
    BackwardsRange { first: NaiveDate, last: NaiveDate },

    #[error("The session store {0:?} doesn't exist; ingest something first")]
    NoStore(PathBuf),
}
