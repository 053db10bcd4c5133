// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use clap::Parser;
use crossbeam_utils::atomic::AtomicCell;
use tempfile::TempDir;

use super::*;
use crate::{store::MetadataStore, tests::*};

fn opts(dry_run: bool) -> RunOpts {
    RunOpts {
        dry_run,
        progress_bars: false,
        cancel: Arc::new(AtomicCell::new(false)),
    }
}

struct Paths {
    _tmp: TempDir,
    data: PathBuf,
    store: String,
    quarantine: String,
}

fn paths() -> Paths {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    std::fs::create_dir(&data).unwrap();
    let store = tmp.path().join("sessions.sqlite").display().to_string();
    let quarantine = tmp.path().join("bad.jsonl").display().to_string();
    Paths {
        _tmp: tmp,
        data,
        store,
        quarantine,
    }
}

#[test]
fn test_exactly_one_scope() {
    let p = paths();
    let args = IngestArgs::parse_from(["ingest", "--store", &p.store]);
    assert!(matches!(
        args.parse(false),
        Err(UptimeError::Config(s)) if s.contains("Nothing to ingest")
    ));

    let data = p.data.display().to_string();
    let args = IngestArgs::parse_from(["ingest", "--dir", &data, "--date", "2017-03-28"]);
    assert!(matches!(
        args.parse(false),
        Err(UptimeError::Config(s)) if s.contains("Only one")
    ));
}

#[test]
fn test_date_scope_needs_an_endpoint() {
    let p = paths();
    #[rustfmt::skip]
    let args = IngestArgs::parse_from([
        "ingest",
        "--date", "2017-03-28",
        "--store", &p.store,
        "--quarantine-log", &p.quarantine,
    ]);
    assert!(matches!(
        args.parse(false),
        Err(UptimeError::Config(s)) if s.contains("--endpoint")
    ));

    // A month isn't a day.
    let data = p.data.display().to_string();
    #[rustfmt::skip]
    let args = IngestArgs::parse_from([
        "ingest",
        "--date", "2017-03",
        "--endpoint", &data,
    ]);
    assert!(matches!(args.parse(false), Err(UptimeError::Config(_))));
}

#[test]
fn test_dry_run_returns_early() {
    let p = paths();
    write_rawacf(&p.data, "sas", 5, utc(2017, 3, 28, 0, 0, 0), utc(2017, 3, 28, 2, 0, 0));
    let data = p.data.display().to_string();
    #[rustfmt::skip]
    let args = IngestArgs::parse_from([
        "ingest",
        "--dir", &data,
        "--store", &p.store,
        "--quarantine-log", &p.quarantine,
        "-j", "2",
    ]);

    let result = args.clone().run(&opts(true));
    assert!(result.is_ok(), "{:?}", result.unwrap_err());
    assert_eq!(MetadataStore::open(&p.store).unwrap().count().unwrap(), 0);

    let result = args.run(&opts(false));
    assert!(result.is_ok(), "{:?}", result.unwrap_err());
    assert_eq!(MetadataStore::open(&p.store).unwrap().count().unwrap(), 1);
}

#[test]
fn test_ingest_a_day_from_an_endpoint() {
    let p = paths();
    write_rawacf(&p.data, "sas", 5, utc(2017, 3, 28, 0, 0, 0), utc(2017, 3, 28, 2, 0, 0));
    write_rawacf(&p.data, "inv", 64, utc(2017, 3, 28, 0, 0, 0), utc(2017, 3, 28, 1, 0, 0));
    write_rawacf(&p.data, "sas", 5, utc(2017, 3, 29, 0, 0, 0), utc(2017, 3, 29, 1, 0, 0));
    let data = p.data.display().to_string();
    #[rustfmt::skip]
    let args = IngestArgs::parse_from([
        "ingest",
        "--date", "2017-03-28",
        "--site", "sas",
        "--endpoint", &data,
        "--store", &p.store,
        "--quarantine-log", &p.quarantine,
    ]);
    let result = args.run(&opts(false));
    assert!(result.is_ok(), "{:?}", result.unwrap_err());

    let store = MetadataStore::open(&p.store).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.sites().unwrap()[0].as_str(), "sas");
}

#[test]
fn test_report_lines() {
    let report = IngestReport {
        candidates: 4,
        ingested: 2,
        duplicate: 1,
        quarantined: 1,
        anomalous: 0,
        skipped: 3,
        stuck: vec![PathBuf::from("slow.rawacf")],
        cancelled: false,
    };
    let lines = report_lines(&report);
    assert_eq!(lines[0], "4 of 4 candidate files processed");
    assert_eq!(lines[1], "2 new sessions, 1 already stored");
    assert!(lines.iter().any(|l| l == "Timed out: slow.rawacf"));
    assert!(!lines.iter().any(|l| l.contains("inconsistent")));
}
