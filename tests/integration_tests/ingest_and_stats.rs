// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs;

use approx::assert_abs_diff_eq;
use tempfile::TempDir;

use crate::{get_cmd_output, uptime, utc, write_session};

#[test]
fn test_ingest_then_stats_json() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let data = tmp_dir.path().join("data");
    fs::create_dir(&data).unwrap();
    write_session(&data, "sas", 5, utc(2017, 3, 28, 0, 0), utc(2017, 3, 28, 2, 0));
    write_session(&data, "sas", 5, utc(2017, 3, 28, 2, 5), utc(2017, 3, 28, 4, 0));
    write_session(&data, "sas", 5, utc(2017, 3, 28, 10, 0), utc(2017, 3, 28, 10, 30));
    fs::write(data.join("20170328.1200.00.sas.rawacf"), b"garbage").unwrap();
    fs::write(data.join("README.txt"), b"not a rawacf file").unwrap();
    let store = tmp_dir.path().join("sessions.sqlite");
    let quarantine = tmp_dir.path().join("bad.jsonl");

    #[rustfmt::skip]
    let cmd = uptime()
        .args([
            "ingest",
            "--dir", &format!("{}", data.display()),
            "--store", &format!("{}", store.display()),
            "--quarantine-log", &format!("{}", quarantine.display()),
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "ingest failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("3 new sessions"), "{stdout}");
    assert!(stdout.contains("1 files quarantined"), "{stdout}");

    let quarantined = fs::read_to_string(&quarantine).unwrap();
    assert_eq!(quarantined.lines().count(), 1);
    assert!(quarantined.contains("20170328.1200.00.sas.rawacf"));

    // Ingesting again changes nothing.
    #[rustfmt::skip]
    let cmd = uptime()
        .args([
            "ingest",
            "--dir", &format!("{}", data.display()),
            "--store", &format!("{}", store.display()),
            "--quarantine-log", &format!("{}", quarantine.display()),
            "--no-progress-bars",
        ])
        .ok();
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("0 new sessions, 3 already stored"), "{stdout}");

    #[rustfmt::skip]
    let cmd = uptime()
        .args([
            "stats",
            "--date", "2017-03-28",
            "--site", "sas",
            "--store", &format!("{}", store.display()),
            "--json",
        ])
        .ok();
    assert!(cmd.is_ok(), "stats failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    let stat: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stat["selection"], "sas");
    assert_eq!(stat["active_seconds"], 16200);
    assert_eq!(stat["window_seconds"], 86400);
    assert_eq!(stat["gap_count"], 1);
    assert_eq!(stat["longest_gap_seconds"], 21600);
    assert_abs_diff_eq!(stat["duty_cycle"].as_f64().unwrap(), 0.1875);
}

#[test]
fn test_stats_needs_a_store() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let store = tmp_dir.path().join("missing.sqlite");
    #[rustfmt::skip]
    let cmd = uptime()
        .args([
            "stats",
            "--date", "2017-03-28",
            "--store", &format!("{}", store.display()),
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("doesn't exist"), "{stderr}");
    assert!(!store.exists());
}

#[test]
fn test_bad_site_is_a_config_error() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    #[rustfmt::skip]
    let cmd = uptime()
        .args([
            "ingest",
            "--date", "2017-03-28",
            "--site", "saskatoon",
            "--endpoint", &format!("{}", tmp_dir.path().display()),
            "--store", &format!("{}", tmp_dir.path().join("s.sqlite").display()),
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.starts_with("Error: "), "{stderr}");
    assert!(stderr.contains("saskatoon"), "{stderr}");
}
