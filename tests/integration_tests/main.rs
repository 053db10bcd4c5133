// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod arg_files;
mod batch;
mod ingest_and_stats;

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    process::Output,
    str::from_utf8,
};

use assert_cmd::{output::OutputError, Command};
use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

fn uptime() -> Command {
    Command::cargo_bin("rawacf-uptime").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn cstring(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

/// A minimal DMAP rawacf record: just the scalars that are read.
fn record(stid: i16, t: DateTime<Utc>) -> Vec<u8> {
    let shorts = [
        ("time.yr", t.year() as i16),
        ("time.mo", t.month() as i16),
        ("time.dy", t.day() as i16),
        ("time.hr", t.hour() as i16),
        ("time.mt", t.minute() as i16),
        ("time.sc", t.second() as i16),
        ("stid", stid),
        ("cp", 150),
        ("nave", 20),
        ("tfreq", 10500),
        ("xcf", 1),
        ("bmnum", 7),
        ("rsep", 45),
        ("txpl", 300),
    ];
    let mut body = vec![];
    for (name, value) in shorts {
        cstring(&mut body, name);
        body.write_i8(2).unwrap();
        body.write_i16::<LittleEndian>(value).unwrap();
    }
    cstring(&mut body, "time.us");
    body.write_i8(3).unwrap();
    body.write_i32::<LittleEndian>(0).unwrap();
    cstring(&mut body, "origin.command");
    body.write_i8(9).unwrap();
    cstring(&mut body, "normalscan -fast");

    let mut bytes = vec![];
    bytes.write_i32::<LittleEndian>(0x0001_0001).unwrap();
    bytes
        .write_i32::<LittleEndian>((16 + body.len()) as i32)
        .unwrap();
    bytes
        .write_i32::<LittleEndian>(shorts.len() as i32 + 2)
        .unwrap();
    bytes.write_i32::<LittleEndian>(0).unwrap();
    bytes.extend(body);
    bytes
}

/// Write a rawacf file holding records every 10 seconds from `start` to
/// `end`.
fn write_session(
    dir: &Path,
    site: &str,
    stid: i16,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> PathBuf {
    let path = dir.join(format!("{}.00.{site}.rawacf", start.format("%Y%m%d.%H%M")));
    let mut bytes = vec![];
    let mut t = start;
    while t < end {
        bytes.extend(record(stid, t));
        t += Duration::seconds(10);
    }
    bytes.extend(record(stid, end));
    File::create(&path).unwrap().write_all(&bytes).unwrap();
    path
}
