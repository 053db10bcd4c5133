// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! SuperDARN radar sites.
//!
//! Every radar is identified by a three-letter site code (e.g. "sas" for
//! Saskatoon) and, inside rawacf files, by a numeric station ID.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A radar known to the SuperDARN network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Radar {
    pub code: &'static str,
    pub stid: i32,
    pub num_beams: u8,
}

macro_rules! radars {
    ($($beams:literal => [$(($code:literal, $stid:literal)),* $(,)?]),* $(,)?) => {
        &[$($(Radar { code: $code, stid: $stid, num_beams: $beams },)*)*]
    };
}

/// All radars that may appear in rawacf files.
pub static RADARS: &[Radar] = radars![
    16 => [
        ("cly", 66), ("gbr", 1), ("han", 10), ("hok", 40), ("hkw", 41),
        ("inv", 64), ("kap", 3), ("ksr", 16), ("kod", 7), ("lyr", 90),
        ("pyk", 9), ("pgr", 6), ("rkn", 65), ("sas", 5), ("sch", 2),
        ("sto", 8), ("dce", 96), ("fir", 21), ("hal", 4), ("ker", 15),
        ("mcm", 20), ("san", 11), ("sps", 22), ("sye", 13), ("sys", 12),
        ("tig", 14), ("unw", 18), ("zho", 19),
    ],
    22 => [("ade", 209), ("adw", 208), ("fhe", 205), ("fhw", 204), ("bpk", 24)],
    24 => [("bks", 33), ("cve", 207), ("cvw", 206), ("wal", 32)],
];

/// Find a radar by the station ID recorded in its files.
pub fn radar_by_stid(stid: i32) -> Option<&'static Radar> {
    RADARS.iter().find(|r| r.stid == stid)
}

/// Find a radar by its site code.
pub fn radar_by_code(code: &str) -> Option<&'static Radar> {
    RADARS.iter().find(|r| r.code == code)
}

/// A well-formed site code: exactly three lowercase ASCII letters. A site code
/// does not have to belong to a known radar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SiteCode(String);

impl SiteCode {
    pub fn new(code: &str) -> Result<SiteCode, SiteCodeError> {
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_lowercase()) {
            Ok(SiteCode(code.to_string()))
        } else {
            Err(SiteCodeError {
                code: code.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The radar this site code belongs to, if it is a known one.
    pub fn radar(&self) -> Option<&'static Radar> {
        radar_by_code(&self.0)
    }
}

impl fmt::Display for SiteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User input is trimmed and lowercased before validation.
impl FromStr for SiteCode {
    type Err = SiteCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SiteCode::new(&s.trim().to_lowercase())
    }
}

impl TryFrom<String> for SiteCode {
    type Error = SiteCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        SiteCode::new(&s)
    }
}

impl From<SiteCode> for String {
    fn from(s: SiteCode) -> String {
        s.0
    }
}

/// Which sites a query or statistic covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SiteSelection {
    Site(SiteCode),

    /// Every site present in the store.
    All,
}

impl SiteSelection {
    pub fn site(&self) -> Option<&SiteCode> {
        match self {
            SiteSelection::Site(s) => Some(s),
            SiteSelection::All => None,
        }
    }
}

impl From<Option<SiteCode>> for SiteSelection {
    fn from(s: Option<SiteCode>) -> Self {
        s.map(SiteSelection::Site).unwrap_or(SiteSelection::All)
    }
}

impl fmt::Display for SiteSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteSelection::Site(s) => s.fmt(f),
            SiteSelection::All => f.write_str("all"),
        }
    }
}

impl FromStr for SiteSelection {
    type Err = SiteCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(SiteSelection::All)
        } else {
            s.parse().map(SiteSelection::Site)
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{code}' is not a valid site code; expected three lowercase letters (e.g. 'sas')")]
pub struct SiteCodeError {
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_codes_are_validated() {
        assert!(SiteCode::new("sas").is_ok());
        assert!(SiteCode::new("SAS").is_err());
        assert!(SiteCode::new("sa").is_err());
        assert!(SiteCode::new("sask").is_err());
        assert!(SiteCode::new("s4s").is_err());
        assert!(SiteCode::new("").is_err());

        // Parsing user input is forgiving about case and whitespace.
        let result: Result<SiteCode, _> = " SAS ".parse();
        assert!(result.is_ok(), "{:?}", result.unwrap_err());
        assert_eq!(result.unwrap().as_str(), "sas");
    }

    #[test]
    fn site_selection_parses_all() {
        assert_eq!("all".parse::<SiteSelection>().unwrap(), SiteSelection::All);
        assert_eq!("ALL".parse::<SiteSelection>().unwrap(), SiteSelection::All);
        assert_eq!(
            "inv".parse::<SiteSelection>().unwrap(),
            SiteSelection::Site(SiteCode::new("inv").unwrap())
        );
        assert!("everything".parse::<SiteSelection>().is_err());
        assert_eq!(SiteSelection::All.to_string(), "all");
    }

    #[test]
    fn radar_table_lookups() {
        let sas = radar_by_stid(5).unwrap();
        assert_eq!(sas.code, "sas");
        assert_eq!(sas.num_beams, 16);
        assert_eq!(radar_by_code("bpk").unwrap().num_beams, 22);
        assert_eq!(radar_by_code("wal").unwrap().stid, 32);
        assert!(radar_by_stid(12345).is_none());

        // Station IDs and codes are unique.
        for (i, a) in RADARS.iter().enumerate() {
            assert!(SiteCode::new(a.code).is_ok());
            for b in &RADARS[i + 1..] {
                assert_ne!(a.stid, b.stid);
                assert_ne!(a.code, b.code);
            }
        }
    }

    #[test]
    fn site_code_serde_validates() {
        let code: Result<SiteCode, _> = serde_json::from_str("\"kod\"");
        assert!(code.is_ok());
        let code: Result<SiteCode, _> = serde_json::from_str("\"KODIAK\"");
        assert!(code.is_err());
    }
}
