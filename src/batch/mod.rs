// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Running ingestion (and optionally statistics) over many days.
//!
//! A day whose files can't be obtained is recorded as skipped and the batch
//! moves on; a partially completed range is a normal result. Only errors that
//! happen before any day is attempted are returned as [`BatchError`].

mod error;
mod hooks;

pub use error::{BatchError, HookError};
pub use hooks::{run_hooks, CopyStore, MoveFiles, PostBatchHook};

use chrono::{Datelike, Duration, NaiveDate};
use crossbeam_utils::atomic::AtomicCell;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    ingest::{IngestReport, IngestScope, Ingester},
    site::{SiteCode, SiteSelection},
    stats::{UptimeCalculator, UptimeStatistic},
    window::Window,
};

/// An inclusive range of UTC dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    first: NaiveDate,
    last: NaiveDate,
}

impl DateRange {
    pub fn new(first: NaiveDate, last: NaiveDate) -> Result<DateRange, BatchError> {
        if last < first {
            return Err(BatchError::BackwardsRange { first, last });
        }
        Ok(DateRange { first, last })
    }

    pub fn day(date: NaiveDate) -> DateRange {
        DateRange {
            first: date,
            last: date,
        }
    }

    /// Every day of a calendar month.
    pub fn month(year: i32, month: u32) -> Result<DateRange, BatchError> {
        let window = Window::month(year, month)?;
        let first = window.start().date_naive();
        let last = (window.end() - Duration::days(1)).date_naive();
        Ok(DateRange { first, last })
    }

    /// Every day from the first day of `from` to the last day of `to`; both are
    /// (year, month) pairs.
    pub fn months(from: (i32, u32), to: (i32, u32)) -> Result<DateRange, BatchError> {
        let first = DateRange::month(from.0, from.1)?.first;
        let last = DateRange::month(to.0, to.1)?.last;
        DateRange::new(first, last)
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.last
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last;
        self.first.iter_days().take_while(move |&d| d <= last)
    }

    pub fn num_days(&self) -> usize {
        (self.last - self.first).num_days() as usize + 1
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else if self.first.day() == 1
            && self.first.month() == self.last.month()
            && self.first.year() == self.last.year()
            && (self.last + Duration::days(1)).day() == 1
        {
            write!(f, "{}", self.first.format("%Y-%m"))
        } else {
            write!(f, "{} to {}", self.first, self.last)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DayOutcome {
    Completed {
        report: IngestReport,

        /// The day's statistic, if statistics were requested and could be
        /// computed.
        #[serde(skip_serializing_if = "Option::is_none")]
        stats: Option<UptimeStatistic>,

        /// Why the statistic couldn't be computed.
        #[serde(skip_serializing_if = "Option::is_none")]
        stats_error: Option<String>,
    },

    /// Nothing was ingested for the day.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayResult {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub outcome: DayOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub range: DateRange,

    /// One entry per attempted day, in date order. Days after a cancellation
    /// are absent.
    pub days: Vec<DayResult>,

    /// The sum of every completed day's ingestion counts.
    pub totals: IngestReport,

    pub cancelled: bool,
}

impl BatchReport {
    pub fn completed_days(&self) -> usize {
        self.days
            .iter()
            .filter(|d| matches!(d.outcome, DayOutcome::Completed { .. }))
            .count()
    }

    pub fn skipped_days(&self) -> impl Iterator<Item = (NaiveDate, &str)> {
        self.days.iter().filter_map(|d| match &d.outcome {
            DayOutcome::Skipped { reason } => Some((d.date, reason.as_str())),
            DayOutcome::Completed { .. } => None,
        })
    }
}

pub struct BatchRunner {
    ingester: Ingester,
    calculator: Option<UptimeCalculator>,
}

impl BatchRunner {
    /// The ingester must have a file source.
    pub fn new(ingester: Ingester) -> BatchRunner {
        BatchRunner {
            ingester,
            calculator: None,
        }
    }

    /// Also compute each completed day's statistic.
    pub fn with_stats(mut self, calculator: UptimeCalculator) -> BatchRunner {
        self.calculator = Some(calculator);
        self
    }

    pub fn ingester(&self) -> &Ingester {
        &self.ingester
    }

    pub fn run_scope(
        &self,
        range: &DateRange,
        site: Option<&SiteCode>,
    ) -> Result<BatchReport, BatchError> {
        self.run_scope_with_cancel(range, site, &AtomicCell::new(false))
    }

    /// Ingest every day of `range`. Cancellation is checked between days, and
    /// between files within a day.
    pub fn run_scope_with_cancel(
        &self,
        range: &DateRange,
        site: Option<&SiteCode>,
        cancel: &AtomicCell<bool>,
    ) -> Result<BatchReport, BatchError> {
        let source = self.ingester.source().ok_or(BatchError::NoFileSource)?;
        info!(
            "Running {range} ({} days) for {} from {}",
            range.num_days(),
            site.map(|s| s.as_str()).unwrap_or("all sites"),
            source.describe()
        );

        let mut report = BatchReport {
            range: *range,
            days: Vec::with_capacity(range.num_days()),
            totals: IngestReport::default(),
            cancelled: false,
        };
        for date in range.days() {
            if cancel.load() {
                report.cancelled = true;
                break;
            }
            let outcome = self.run_day(date, site, cancel);
            if let DayOutcome::Completed { report: day, .. } = &outcome {
                report.totals.merge(day);
                if day.cancelled {
                    report.cancelled = true;
                } else if let Err(e) = source.release(site, date) {
                    // The day's data is already stored, so this doesn't undo
                    // it.
                    warn!("Couldn't release the files for {date}: {e}");
                }
            }
            report.days.push(DayResult { date, outcome });
            if report.cancelled {
                break;
            }
        }

        info!(
            "Finished {range}: {} days completed, {} skipped{}",
            report.completed_days(),
            report.skipped_days().count(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    fn run_day(
        &self,
        date: NaiveDate,
        site: Option<&SiteCode>,
        cancel: &AtomicCell<bool>,
    ) -> DayOutcome {
        let scope = IngestScope::Day {
            date,
            site: site.cloned(),
        };
        let day_report = match self.ingester.ingest_with_cancel(&scope, cancel) {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping {date}: {e}");
                return DayOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };
        debug!("{date}: {day_report:?}");

        let (stats, stats_error) = match &self.calculator {
            Some(calc) if !day_report.cancelled => {
                let selection = SiteSelection::from(site.cloned());
                match calc.stats_for_day(&selection, date) {
                    Ok(s) => (Some(s), None),
                    Err(e) => {
                        warn!("Couldn't compute statistics for {date}: {e}");
                        (None, Some(e.to_string()))
                    }
                }
            }
            _ => (None, None),
        };
        DayOutcome::Completed {
            report: day_report,
            stats,
            stats_error,
        }
    }
}
