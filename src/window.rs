// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Half-open UTC time windows, `[start, end)`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Window, WindowError> {
        if end < start {
            return Err(WindowError::EndBeforeStart { start, end });
        }
        Ok(Window { start, end })
    }

    /// The window covering a whole UTC day.
    pub fn day(date: NaiveDate) -> Window {
        let start = midnight(date);
        Window {
            start,
            end: start + Duration::days(1),
        }
    }

    /// The window covering a whole UTC calendar month.
    pub fn month(year: i32, month: u32) -> Result<Window, WindowError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(WindowError::InvalidMonth { year, month })?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .ok_or(WindowError::InvalidMonth { year, month })?;
        Ok(Window {
            start: midnight(first),
            end: midnight(next),
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn seconds(&self) -> i64 {
        self.end.timestamp() - self.start.timestamp()
    }

    /// Grow the window by `secs` on both sides, saturating at the limits of
    /// representable time.
    pub fn widen(&self, secs: i64) -> Window {
        let by = Duration::seconds(secs.clamp(0, i64::MAX / 1000));
        Window {
            start: self
                .start
                .checked_sub_signed(by)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: self
                .end
                .checked_add_signed(by)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// The UTC dates whose midnight falls inside this window.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let end = self.end;
        self.start
            .date_naive()
            .iter_days()
            .skip_while(|&d| midnight(d) < self.start)
            .take_while(|&d| midnight(d) < end)
            .collect()
    }
}

/// Every date of a calendar month.
pub fn days_in_month(year: i32, month: u32) -> Result<Vec<NaiveDate>, WindowError> {
    Ok(Window::month(year, month)?.dates())
}

pub(crate) fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Window end ({end}) is before its start ({start})")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("{year}-{month:02} is not a valid month")]
    InvalidMonth { year: i32, month: u32 },
}
