// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to parse strings into plain numbers or some quantity with a unit.

mod error;

pub use error::*;

use std::time::Duration;

use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, EnumIter, EnumString, IntoStaticStr)]
pub enum TimeFormat {
    /// Seconds
    S,

    /// Minutes
    Min,

    /// Hours
    H,

    /// Days
    D,

    NoUnit,
}

impl TimeFormat {
    /// How many seconds one of this unit is. Unitless numbers are seconds.
    pub fn seconds(self) -> f64 {
        match self {
            TimeFormat::S | TimeFormat::NoUnit => 1.0,
            TimeFormat::Min => 60.0,
            TimeFormat::H => 3600.0,
            TimeFormat::D => 86400.0,
        }
    }
}

/// Parse a string that may have a unit of time attached to it.
pub fn parse_time(s: &str) -> Result<(f64, TimeFormat), UnitParseError> {
    // Try to parse a naked number.
    let maybe_number: Option<f64> = s.trim().parse().ok();
    if let Some(number) = maybe_number {
        return Ok((number, TimeFormat::NoUnit));
    };

    // That didn't work; let's search over our supported formats.
    for time_format in TimeFormat::iter().filter(|&tf| tf != TimeFormat::NoUnit) {
        let time_format_str: &'static str = time_format.into();
        let suffix = s
            .trim()
            .trim_start_matches(|c| char::is_numeric(c) || c == '.' || c == '-')
            .trim();
        if suffix.to_uppercase() == time_format_str.to_uppercase() {
            let prefix = s.trim().trim_end_matches(char::is_alphabetic).trim();
            let number: f64 = match prefix.parse() {
                Ok(n) => n,
                Err(_) => {
                    return Err(UnitParseError::GotTimeUnitButCantParse {
                        input: s.to_string(),
                        unit: time_format_str,
                    })
                }
            };
            return Ok((number, time_format));
        }
    }

    // If we made it this far, we don't know how to parse the string.
    Err(UnitParseError::Unknown {
        input: s.to_string(),
        unit_type: "time",
    })
}

/// Parse a non-negative duration, e.g. "600", "90s", "10min", "1.5h".
pub fn parse_duration(s: &str) -> Result<Duration, UnitParseError> {
    let (number, unit) = parse_time(s)?;
    let seconds = number * unit.seconds();
    if !seconds.is_finite() {
        return Err(UnitParseError::NotFinite(s.to_string()));
    }
    if seconds < 0.0 {
        return Err(UnitParseError::Negative(s.to_string()));
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| UnitParseError::TooLarge(s.to_string()))
}
