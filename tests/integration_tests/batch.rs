// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs;

use tempfile::TempDir;

use crate::{get_cmd_output, uptime, utc, write_session};

#[test]
fn test_batch_over_days() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let endpoint = tmp_dir.path().join("endpoint");
    fs::create_dir(&endpoint).unwrap();
    write_session(&endpoint, "sas", 5, utc(2017, 3, 27, 6, 0), utc(2017, 3, 27, 7, 0));
    write_session(&endpoint, "kod", 7, utc(2017, 3, 28, 0, 0), utc(2017, 3, 28, 3, 0));
    let store = tmp_dir.path().join("sessions.sqlite");
    let report = tmp_dir.path().join("report.json");

    #[rustfmt::skip]
    let cmd = uptime()
        .args([
            "batch",
            "--from", "2017-03-27",
            "--to", "2017-03-29",
            "--endpoint", &format!("{}", endpoint.display()),
            "--store", &format!("{}", store.display()),
            "--quarantine-log", &format!("{}", tmp_dir.path().join("bad.jsonl").display()),
            "--with-stats",
            "--report-json", &format!("{}", report.display()),
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "batch failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("3 of 3 days completed"), "{stdout}");

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(report["totals"]["ingested"], 2);
    let days = report["days"].as_array().unwrap();
    assert_eq!(days.len(), 3);
    assert_eq!(days[0]["stats"]["active_seconds"], 3600);
    assert_eq!(days[1]["stats"]["active_seconds"], 3 * 3600);
    assert_eq!(days[2]["stats"]["active_seconds"], 0);
    // Both sites are in the store by the time the last day is computed.
    assert_eq!(days[2]["stats"]["window_seconds"], 2 * 86400);
}

#[test]
fn test_batch_skips_unavailable_days() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    #[rustfmt::skip]
    let cmd = uptime()
        .args([
            "batch",
            "--month", "2017-02",
            "--endpoint", &format!("{}", tmp_dir.path().join("nowhere").display()),
            "--store", &format!("{}", tmp_dir.path().join("s.sqlite").display()),
            "--quarantine-log", &format!("{}", tmp_dir.path().join("bad.jsonl").display()),
        ])
        .ok();
    // Skipped days aren't an error.
    assert!(cmd.is_ok(), "batch failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("0 of 28 days completed"), "{stdout}");
}
