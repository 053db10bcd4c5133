// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turning session records into operating intervals.
//!
//! An operating interval is a maximal span during which a site was recording.
//! Sessions are scanned in start order; a session that begins no later than
//! `gap_threshold` after the running interval's end extends it, anything else
//! closes it. Sessions inside the running interval are absorbed, so duplicate
//! and overlapping records have no effect.


use std::time::Duration;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;

use crate::{record::SessionRecord, site::SiteCode, window::Window};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatingInterval {
    pub site: SiteCode,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OperatingInterval {
    pub fn seconds(&self) -> i64 {
        self.end.timestamp() - self.start.timestamp()
    }

    /// The part of this interval inside `window`, if any.
    pub fn clip(&self, window: &Window) -> Option<OperatingInterval> {
        let start = self.start.max(window.start());
        let end = self.end.min(window.end());
        if start < end {
            Some(OperatingInterval {
                site: self.site.clone(),
                start,
                end,
            })
        } else {
            None
        }
    }
}

/// A lazy iterator of operating intervals over records that are sorted by
/// start time. It can be restarted by building it again from the same
/// records.
pub struct Intervals<'a, I>
where
    I: Iterator<Item = &'a SessionRecord>,
{
    records: I,
    gap_threshold_secs: i64,
    current: Option<OperatingInterval>,
}

impl<'a, I> Intervals<'a, I>
where
    I: Iterator<Item = &'a SessionRecord>,
{
    /// The records must already be sorted by start time.
    pub fn new(records: I, gap_threshold: Duration) -> Intervals<'a, I> {
        Intervals {
            records,
            gap_threshold_secs: i64::try_from(gap_threshold.as_secs()).unwrap_or(i64::MAX),
            current: None,
        }
    }
}

impl<'a, I> Iterator for Intervals<'a, I>
where
    I: Iterator<Item = &'a SessionRecord>,
{
    type Item = OperatingInterval;

    fn next(&mut self) -> Option<OperatingInterval> {
        for record in self.records.by_ref() {
            match self.current.as_mut() {
                None => {
                    self.current = Some(OperatingInterval {
                        site: record.site.clone(),
                        start: record.start,
                        end: record.end,
                    });
                }
                Some(cur)
                    if record.start.timestamp().saturating_sub(cur.end.timestamp())
                        <= self.gap_threshold_secs =>
                {
                    cur.end = cur.end.max(record.end);
                }
                Some(_) => {
                    let next = OperatingInterval {
                        site: record.site.clone(),
                        start: record.start,
                        end: record.end,
                    };
                    return self.current.replace(next);
                }
            }
        }
        self.current.take()
    }
}

/// Build the operating intervals of one site's records. Records are sorted by
/// start time first if they aren't already.
///
/// Records of different sites must not be mixed; statistics for several
/// sites are computed per site and then combined.
pub fn build_intervals(
    records: &[SessionRecord],
    gap_threshold: Duration,
) -> Intervals<'_, std::vec::IntoIter<&SessionRecord>> {
    let mut refs: Vec<&SessionRecord> = records.iter().collect();
    let sorted = refs.iter().tuple_windows().all(|(a, b)| a.start <= b.start);
    if !sorted {
        refs.sort_by_key(|r| (r.start, r.end));
    }
    Intervals::new(refs.into_iter(), gap_threshold)
}
