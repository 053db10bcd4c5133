// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to turn rawacf files into session metadata.
//!
//! Decoding sits behind the [`SessionDecode`] trait so that the ingestion
//! pipeline never interprets file bytes itself. [`DmapDecoder`] is the
//! implementation for SuperDARN rawacf files.

pub(crate) mod dmap;
mod error;

pub use dmap::DmapError;
pub use error::DecodeError;

use std::{
    fs::File,
    io::Read,
    path::Path,
    process::{Command, Stdio},
};

use chrono::{DateTime, NaiveDate, SubsecRound, TimeZone, Utc};
use flate2::read::GzDecoder;
use itertools::Itertools;
use log::{debug, trace, warn};

use crate::{
    constants::{CONSISTENT_RAWACF_THRESH_SECS, DEFAULT_BZ2_DECOMPRESSOR},
    record::{DecodedSession, ExperimentParams},
    site::radar_by_stid,
};
use dmap::{DmapRecord, DmapScalar};

/// Something that can turn a file into session metadata.
///
/// Implementations must not panic on malformed input; every problem should be
/// reported as a [`DecodeError`]. Decoding must only read the file.
pub trait SessionDecode: Send + Sync {
    /// Should this file be decoded at all? Files that aren't accepted are
    /// skipped by the ingestion pipeline rather than quarantined.
    fn accepts(&self, path: &Path) -> bool;

    fn decode(&self, path: &Path) -> Result<DecodedSession, DecodeError>;
}

/// How a rawacf file is compressed, judging by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
}

impl Compression {
    /// Classify a file like `20170328.0001.00.sas.rawacf.bz2`. Returns `None`
    /// if the file isn't a rawacf file.
    pub fn from_path(path: &Path) -> Option<Compression> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".rawacf") {
            Some(Compression::None)
        } else if name.ends_with(".rawacf.gz") {
            Some(Compression::Gzip)
        } else if name.ends_with(".rawacf.bz2") {
            Some(Compression::Bzip2)
        } else {
            None
        }
    }
}

/// Decodes DMAP-format rawacf files.
///
/// `.bz2` files are piped through an external decompressor; without one
/// configured, they fail with `unsupported_compression`.
#[derive(Debug, Clone)]
pub struct DmapDecoder {
    bz2_command: Option<Vec<String>>,
}

impl Default for DmapDecoder {
    fn default() -> Self {
        DmapDecoder::new(Some(DEFAULT_BZ2_DECOMPRESSOR))
    }
}

impl DmapDecoder {
    /// `bz2_command` is a whitespace-separated program and arguments, e.g.
    /// "bzip2 -dc". The file to decompress is appended to the arguments.
    pub fn new(bz2_command: Option<&str>) -> DmapDecoder {
        let bz2_command = bz2_command
            .map(|c| c.split_whitespace().map(|s| s.to_string()).collect_vec())
            .filter(|c| !c.is_empty());
        DmapDecoder { bz2_command }
    }

    fn read_bytes(&self, path: &Path, compression: Compression) -> Result<Vec<u8>, DecodeError> {
        match compression {
            Compression::None => Ok(std::fs::read(path)?),

            Compression::Gzip => {
                let mut bytes = vec![];
                GzDecoder::new(File::open(path)?)
                    .read_to_end(&mut bytes)
                    .map_err(DecodeError::Gzip)?;
                Ok(bytes)
            }

            Compression::Bzip2 => {
                let command = self
                    .bz2_command
                    .as_deref()
                    .ok_or(DecodeError::NoDecompressor("bz2"))?;
                run_decompressor(command, path)
            }
        }
    }
}

fn run_decompressor(command: &[String], path: &Path) -> Result<Vec<u8>, DecodeError> {
    let (program, args) = command
        .split_first()
        .ok_or(DecodeError::NoDecompressor("bz2"))?;
    trace!("Running {} on {}", command.join(" "), path.display());
    let output = Command::new(program)
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| DecodeError::DecompressorUnavailable {
            command: command.join(" "),
            err,
        })?;
    if !output.status.success() {
        return Err(DecodeError::DecompressorFailed {
            command: command.join(" "),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

impl SessionDecode for DmapDecoder {
    fn accepts(&self, path: &Path) -> bool {
        Compression::from_path(path).is_some()
    }

    fn decode(&self, path: &Path) -> Result<DecodedSession, DecodeError> {
        let compression =
            Compression::from_path(path).ok_or_else(|| DecodeError::NotRawacf(path.to_path_buf()))?;
        let bytes = self.read_bytes(path, compression)?;
        let records = dmap::read_records(&bytes)?;
        let session = session_from_records(&records)?;
        debug!(
            "{}: {} records, {} to {}",
            path.display(),
            records.len(),
            session.start,
            session.end
        );
        Ok(session)
    }
}

/// The scalars of a rawacf record that session metadata is derived from.
struct RecordFields {
    time: DateTime<Utc>,
    stid: i32,
    cp: i32,
    command: String,
    nave: i32,
    tfreq: i32,
    xcf: i32,
    bmnum: i32,
    rsep: i32,
    txpl: i32,
}

impl RecordFields {
    fn new(record: &DmapRecord, index: usize) -> Result<RecordFields, DecodeError> {
        let int = |name: &'static str| -> Result<i32, DecodeError> {
            let scalar = record.get(name).ok_or(DecodeError::MissingField {
                record: index,
                name,
            })?;
            scalar
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or(DecodeError::WrongFieldType {
                    record: index,
                    name,
                })
        };

        // Older files may not record the command line.
        let command = match record.get("origin.command") {
            None => String::new(),
            Some(DmapScalar::String(s)) => s.clone(),
            Some(_) => {
                return Err(DecodeError::WrongFieldType {
                    record: index,
                    name: "origin.command",
                })
            }
        };

        let mut us = int("time.us")?;
        if !(0..=999_999).contains(&us) {
            warn!("Record {index} has an out-of-range microsecond value ({us}); using 1");
            us = 1;
        }
        let time = to_datetime(
            int("time.yr")?,
            int("time.mo")?,
            int("time.dy")?,
            int("time.hr")?,
            int("time.mt")?,
            int("time.sc")?,
            us,
        )
        .map_err(|detail| DecodeError::BadTimestamp {
            record: index,
            detail,
        })?;

        Ok(RecordFields {
            time,
            stid: int("stid")?,
            cp: int("cp")?,
            command,
            nave: int("nave")?,
            tfreq: int("tfreq")?,
            xcf: int("xcf")?,
            bmnum: int("bmnum")?,
            rsep: int("rsep")?,
            txpl: int("txpl")?,
        })
    }
}

fn to_datetime(
    year: i32,
    month: i32,
    day: i32,
    hour: i32,
    minute: i32,
    second: i32,
    micro: i32,
) -> Result<DateTime<Utc>, String> {
    let detail =
        || format!("{year}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micro:06}");
    let u = |v: i32| u32::try_from(v).ok();
    let date = NaiveDate::from_ymd_opt(
        year,
        u(month).ok_or_else(detail)?,
        u(day).ok_or_else(detail)?,
    )
    .ok_or_else(detail)?;
    let datetime = date
        .and_hms_micro_opt(
            u(hour).ok_or_else(detail)?,
            u(minute).ok_or_else(detail)?,
            u(second).ok_or_else(detail)?,
            u(micro).ok_or_else(detail)?,
        )
        .ok_or_else(detail)?;
    Ok(Utc.from_utc_datetime(&datetime))
}

/// Derive a session from all of a file's records.
pub(crate) fn session_from_records(records: &[DmapRecord]) -> Result<DecodedSession, DecodeError> {
    if records.len() < 2 {
        return Err(DecodeError::TooFewRecords(records.len()));
    }
    let fields: Vec<RecordFields> = records
        .iter()
        .enumerate()
        .map(|(i, r)| RecordFields::new(r, i))
        .collect::<Result<_, _>>()?;
    // Safe: there are at least two records.
    let first = &fields[0];
    let last = &fields[fields.len() - 1];

    let radar = radar_by_stid(first.stid).ok_or(DecodeError::UnknownStation(first.stid))?;

    let times_consistent = fields.iter().tuple_windows().all(|(a, b)| {
        let diff = (b.time - a.time).num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6;
        (0.0..CONSISTENT_RAWACF_THRESH_SECS).contains(&diff)
    });

    let anomalies = find_anomalies(&fields, radar.num_beams);
    if !anomalies.is_empty() {
        debug!("Data anomalies detected: {}", anomalies.join("; "));
    }

    let (cmd_name, cmd_args) = match first.command.split_once(' ') {
        Some((name, args)) => (name.to_string(), args.to_string()),
        None => (first.command.clone(), String::new()),
    };

    Ok(DecodedSession {
        site: radar.code.to_string(),
        start: first.time.trunc_subsecs(0),
        end: last.time.trunc_subsecs(0),
        experiment: ExperimentParams {
            stid: first.stid,
            cpid: first.cp,
            cmd_name,
            cmd_args,
            min_nave: fields.iter().map(|f| f.nave).min().unwrap_or_default(),
            times_consistent,
            data_consistent: anomalies.is_empty(),
            min_tfreq: fields.iter().map(|f| f.tfreq).min().unwrap_or_default(),
            max_tfreq: fields.iter().map(|f| f.tfreq).max().unwrap_or_default(),
            xcf: first.xcf,
        },
    })
}

/// Fields that should never change within a file, or that must satisfy
/// simple relations, are checked here. Each problem is described in the
/// returned strings.
fn find_anomalies(fields: &[RecordFields], num_beams: u8) -> Vec<String> {
    let mut anomalies = vec![];
    let Some(first) = fields.first() else {
        return anomalies;
    };
    for (i, f) in fields.iter().enumerate() {
        if f.cp != first.cp {
            anomalies.push(format!("record {i}: cp changed from {} to {}", first.cp, f.cp));
        }
        if f.command != first.command {
            anomalies.push(format!("record {i}: origin.command changed"));
        }
        if f.stid != first.stid {
            anomalies.push(format!(
                "record {i}: stid changed from {} to {}",
                first.stid, f.stid
            ));
        }
        if f.xcf != first.xcf {
            anomalies.push(format!("record {i}: xcf changed from {} to {}", first.xcf, f.xcf));
        }
        // rsep [km] must equal txpl [us] * 3 / 20.
        if i64::from(f.rsep) * 20 != i64::from(f.txpl) * 3 {
            anomalies.push(format!(
                "record {i}: rsep ({}) doesn't match txpl ({})",
                f.rsep, f.txpl
            ));
        }
        if !(0..i32::from(num_beams)).contains(&f.bmnum) {
            anomalies.push(format!(
                "record {i}: beam {} is outside 0..{num_beams}",
                f.bmnum
            ));
        }
    }
    anomalies
}
