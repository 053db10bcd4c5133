// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpful functions for tests: writing synthetic rawacf files and making
//! session records.

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use flate2::{write::GzEncoder, Compression};

use crate::{
    constants::DMAP_ENCODING_CODE,
    decode::dmap::DmapScalar,
    record::{ExperimentParams, SessionRecord},
    site::SiteCode,
};

pub(crate) fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

pub(crate) fn session_record(
    site: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> SessionRecord {
    SessionRecord {
        site: SiteCode::new(site).unwrap(),
        start,
        end,
        source_file: format!("{}.{site}.rawacf", start.format("%Y%m%d.%H%M")),
        experiment: ExperimentParams {
            stid: crate::site::radar_by_code(site).map(|r| r.stid).unwrap_or(0),
            data_consistent: true,
            times_consistent: true,
            ..Default::default()
        },
    }
}

/// The scalars of one synthetic rawacf record.
#[derive(Debug, Clone)]
pub(crate) struct RawacfRecord {
    pub(crate) time: DateTime<Utc>,
    pub(crate) stid: i16,
    pub(crate) cp: i16,
    pub(crate) command: Option<String>,
    pub(crate) nave: i16,
    pub(crate) tfreq: i16,
    pub(crate) xcf: i16,
    pub(crate) bmnum: i16,
    pub(crate) rsep: i16,
    pub(crate) txpl: i16,
}

impl RawacfRecord {
    pub(crate) fn new(stid: i16, time: DateTime<Utc>) -> RawacfRecord {
        RawacfRecord {
            time,
            stid,
            cp: 150,
            command: Some("normalscan -fast".to_string()),
            nave: 20,
            tfreq: 10500,
            xcf: 1,
            bmnum: 7,
            rsep: 45,
            txpl: 300,
        }
    }

    fn scalars(&self) -> Vec<(&'static str, DmapScalar)> {
        let t = self.time;
        let mut scalars = vec![
            ("time.yr", DmapScalar::Short(t.year() as i16)),
            ("time.mo", DmapScalar::Short(t.month() as i16)),
            ("time.dy", DmapScalar::Short(t.day() as i16)),
            ("time.hr", DmapScalar::Short(t.hour() as i16)),
            ("time.mt", DmapScalar::Short(t.minute() as i16)),
            ("time.sc", DmapScalar::Short(t.second() as i16)),
            (
                "time.us",
                DmapScalar::Int((t.timestamp_subsec_micros()) as i32),
            ),
            ("stid", DmapScalar::Short(self.stid)),
            ("cp", DmapScalar::Short(self.cp)),
            ("nave", DmapScalar::Short(self.nave)),
            ("tfreq", DmapScalar::Short(self.tfreq)),
            ("xcf", DmapScalar::Short(self.xcf)),
            ("bmnum", DmapScalar::Short(self.bmnum)),
            ("rsep", DmapScalar::Short(self.rsep)),
            ("txpl", DmapScalar::Short(self.txpl)),
            ("noise.sky", DmapScalar::Float(2.5)),
            ("combf", DmapScalar::String("$Id: normalscan.c$".to_string())),
        ];
        if let Some(c) = &self.command {
            scalars.push(("origin.command", DmapScalar::String(c.clone())));
        }
        scalars
    }

    /// Encode this record as DMAP bytes. A couple of arrays are included so
    /// that readers have to skip them.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let scalars = self.scalars();
        let mut body = vec![];
        for (name, value) in &scalars {
            write_cstring(&mut body, name);
            body.write_i8(value.type_code()).unwrap();
            write_scalar(&mut body, value);
        }

        // 1D short array.
        write_cstring(&mut body, "slist");
        body.write_i8(2).unwrap();
        body.write_i32::<LittleEndian>(1).unwrap();
        body.write_i32::<LittleEndian>(4).unwrap();
        for v in [0i16, 5, 10, 15] {
            body.write_i16::<LittleEndian>(v).unwrap();
        }
        // 3D float array.
        write_cstring(&mut body, "acfd");
        body.write_i8(4).unwrap();
        body.write_i32::<LittleEndian>(3).unwrap();
        for d in [4, 2, 2] {
            body.write_i32::<LittleEndian>(d).unwrap();
        }
        for i in 0..16 {
            body.write_f32::<LittleEndian>(i as f32).unwrap();
        }
        // String array.
        write_cstring(&mut body, "notes");
        body.write_i8(9).unwrap();
        body.write_i32::<LittleEndian>(1).unwrap();
        body.write_i32::<LittleEndian>(2).unwrap();
        write_cstring(&mut body, "first");
        write_cstring(&mut body, "second");

        let mut bytes = vec![];
        bytes.write_i32::<LittleEndian>(DMAP_ENCODING_CODE).unwrap();
        bytes
            .write_i32::<LittleEndian>((16 + body.len()) as i32)
            .unwrap();
        bytes.write_i32::<LittleEndian>(scalars.len() as i32).unwrap();
        bytes.write_i32::<LittleEndian>(3).unwrap();
        bytes.extend(body);
        bytes
    }
}

fn write_cstring(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

fn write_scalar(buf: &mut Vec<u8>, value: &DmapScalar) {
    match value {
        DmapScalar::Char(v) => buf.write_i8(*v).unwrap(),
        DmapScalar::Short(v) => buf.write_i16::<LittleEndian>(*v).unwrap(),
        DmapScalar::Int(v) => buf.write_i32::<LittleEndian>(*v).unwrap(),
        DmapScalar::Long(v) => buf.write_i64::<LittleEndian>(*v).unwrap(),
        DmapScalar::UChar(v) => buf.write_u8(*v).unwrap(),
        DmapScalar::UShort(v) => buf.write_u16::<LittleEndian>(*v).unwrap(),
        DmapScalar::UInt(v) => buf.write_u32::<LittleEndian>(*v).unwrap(),
        DmapScalar::ULong(v) => buf.write_u64::<LittleEndian>(*v).unwrap(),
        DmapScalar::Float(v) => buf.write_f32::<LittleEndian>(*v).unwrap(),
        DmapScalar::Double(v) => buf.write_f64::<LittleEndian>(*v).unwrap(),
        DmapScalar::String(s) => write_cstring(buf, s),
    }
}

/// Records every `step` seconds from `start`, finishing with one at exactly
/// `end`.
pub(crate) fn session_records(
    stid: i16,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: i64,
) -> Vec<RawacfRecord> {
    let mut records = vec![];
    let mut t = start;
    while t < end {
        records.push(RawacfRecord::new(stid, t));
        t += Duration::seconds(step);
    }
    records.push(RawacfRecord::new(stid, end));
    records
}

pub(crate) fn encode_records(records: &[RawacfRecord]) -> Vec<u8> {
    records.iter().flat_map(|r| r.encode()).collect()
}

/// Write a session's worth of records into `dir`, named the way SuperDARN
/// names rawacf files (e.g. `20170328.0000.00.sas.rawacf`).
pub(crate) fn write_rawacf(
    dir: &Path,
    site: &str,
    stid: i16,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> PathBuf {
    let path = dir.join(format!("{}.00.{site}.rawacf", start.format("%Y%m%d.%H%M")));
    let bytes = encode_records(&session_records(stid, start, end, 10));
    File::create(&path).unwrap().write_all(&bytes).unwrap();
    path
}

pub(crate) fn gzip_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(vec![], Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}
