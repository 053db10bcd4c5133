// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Uptime statistics over day, month and arbitrary windows.
//!
//! Statistics for a single site come from its operating intervals, clipped to
//! the window. Statistics for "all" sites are *additive across sites*: every
//! site is computed independently and the active and window seconds are
//! summed, so two sites recording at the same time each contribute their own
//! active time. Intervals of different sites are never merged.
//!
//! Statistics over more than a day (months, date ranges) are the roll-up of
//! one statistic per day. A gap that crosses midnight is therefore counted in
//! each day it touches, and the longest gap is the longest of any day.

mod error;

pub use error::StatsError;

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, trace};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    config::StatsConfig,
    intervals::{build_intervals, OperatingInterval},
    site::{SiteCode, SiteSelection},
    store::MetadataStore,
    window::{midnight, Window},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UptimeStatistic {
    /// A site code, or "all".
    pub selection: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub active_seconds: i64,

    /// For "all", the window length multiplied by the number of sites.
    pub window_seconds: i64,

    /// `active_seconds / window_seconds`, or 0 for an empty window.
    pub duty_cycle: f64,
    pub gap_count: usize,
    pub longest_gap_seconds: i64,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub per_site: Vec<UptimeStatistic>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub per_day: Vec<UptimeStatistic>,
}

impl UptimeStatistic {
    fn combined(selection: String, window: &Window, parts: &[UptimeStatistic]) -> UptimeStatistic {
        let active_seconds = parts.iter().map(|p| p.active_seconds).sum();
        let window_seconds = parts.iter().map(|p| p.window_seconds).sum();
        UptimeStatistic {
            selection,
            window_start: window.start(),
            window_end: window.end(),
            active_seconds,
            window_seconds,
            duty_cycle: duty_cycle(active_seconds, window_seconds),
            gap_count: parts.iter().map(|p| p.gap_count).sum(),
            longest_gap_seconds: parts
                .iter()
                .map(|p| p.longest_gap_seconds)
                .max()
                .unwrap_or(0),
            per_site: vec![],
            per_day: vec![],
        }
    }
}

fn duty_cycle(active_seconds: i64, window_seconds: i64) -> f64 {
    if window_seconds <= 0 {
        0.0
    } else {
        active_seconds as f64 / window_seconds as f64
    }
}

/// Summarise intervals that have already been clipped to `window`. They must
/// be disjoint and ordered by start time, as [`build_intervals`] makes them.
/// Idle time before the first interval or after the last one is not a gap.
pub fn summarise_intervals<I>(selection: &str, window: &Window, intervals: I) -> UptimeStatistic
where
    I: IntoIterator<Item = OperatingInterval>,
{
    let mut active_seconds = 0;
    let mut gap_count = 0;
    let mut longest_gap_seconds = 0;
    let mut prev_end: Option<i64> = None;
    for interval in intervals {
        let (start, end) = (interval.start.timestamp(), interval.end.timestamp());
        active_seconds += end - start;
        if let Some(prev_end) = prev_end {
            gap_count += 1;
            longest_gap_seconds = longest_gap_seconds.max(start - prev_end);
        }
        prev_end = Some(end);
    }
    let window_seconds = window.seconds();
    UptimeStatistic {
        selection: selection.to_string(),
        window_start: window.start(),
        window_end: window.end(),
        active_seconds,
        window_seconds,
        duty_cycle: duty_cycle(active_seconds, window_seconds),
        gap_count,
        longest_gap_seconds,
        per_site: vec![],
        per_day: vec![],
    }
}

/// Computes uptime statistics from the sessions in a store.
#[derive(Clone)]
pub struct UptimeCalculator {
    store: Arc<MetadataStore>,
    config: StatsConfig,
}

impl UptimeCalculator {
    pub fn new(store: Arc<MetadataStore>, config: StatsConfig) -> UptimeCalculator {
        UptimeCalculator { store, config }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Statistics for one site, or every site in the store, over an arbitrary
    /// window.
    pub fn stats_for_window(
        &self,
        selection: &SiteSelection,
        window: &Window,
    ) -> Result<UptimeStatistic, StatsError> {
        match selection {
            SiteSelection::Site(site) => self.site_stats(site, window),
            SiteSelection::All => {
                let sites = self.store.sites()?;
                debug!(
                    "Computing uptime for {} sites over {} to {}",
                    sites.len(),
                    window.start(),
                    window.end()
                );
                let per_site = sites
                    .par_iter()
                    .map(|site| self.site_stats(site, window))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut stat = UptimeStatistic::combined(selection.to_string(), window, &per_site);
                stat.per_site = per_site;
                Ok(stat)
            }
        }
    }

    pub fn stats_for_day(
        &self,
        selection: &SiteSelection,
        date: NaiveDate,
    ) -> Result<UptimeStatistic, StatsError> {
        self.stats_for_window(selection, &Window::day(date))
    }

    /// The roll-up of every day in a calendar month. Each day's statistic is
    /// kept in `per_day`.
    pub fn stats_for_month(
        &self,
        selection: &SiteSelection,
        year: i32,
        month: u32,
    ) -> Result<UptimeStatistic, StatsError> {
        let window = Window::month(year, month)?;
        self.roll_up_days(selection, &window)
    }

    /// The roll-up of every day from `first` to `last`, inclusive.
    pub fn stats_for_range(
        &self,
        selection: &SiteSelection,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<UptimeStatistic, StatsError> {
        let window = Window::new(midnight(first), midnight(last) + Duration::days(1))?;
        self.roll_up_days(selection, &window)
    }

    fn roll_up_days(
        &self,
        selection: &SiteSelection,
        window: &Window,
    ) -> Result<UptimeStatistic, StatsError> {
        let per_day = window
            .dates()
            .into_par_iter()
            .map(|date| self.stats_for_day(selection, date))
            .collect::<Result<Vec<_>, _>>()?;
        let mut stat = UptimeStatistic::combined(selection.to_string(), window, &per_day);
        stat.per_day = per_day;
        Ok(stat)
    }

    fn site_stats(&self, site: &SiteCode, window: &Window) -> Result<UptimeStatistic, StatsError> {
        // Sessions just outside the window can still join an interval that
        // reaches into it.
        let widened = window.widen(self.config.gap_threshold_secs());
        let records = self
            .store
            .query(&SiteSelection::Site(site.clone()), &widened)?;
        trace!("{} sessions for {site} near {}", records.len(), window.start());
        let intervals = build_intervals(&records, self.config.gap_threshold())
            .filter_map(|interval| interval.clip(window));
        Ok(summarise_intervals(site.as_str(), window, intervals))
    }
}
