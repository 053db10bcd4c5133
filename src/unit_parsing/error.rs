// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnitParseError {
    #[error("Successfully parsed a {unit} unit, but could not parse the numerical component of '{input}'")]
    GotTimeUnitButCantParse { input: String, unit: &'static str },

    #[error("Could not parse '{input}' as a {unit_type}")]
    Unknown {
        input: String,
        unit_type: &'static str,
    },

    #[error("'{0}' is negative; durations must be zero or more")]
    Negative(String),

    #[error("'{0}' is not a finite duration")]
    NotFinite(String),

    #[error("'{0}' is too long to be a duration")]
    TooLarge(String),
}
