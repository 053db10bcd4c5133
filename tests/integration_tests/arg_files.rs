// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Arguments files and `--save-toml`.

use std::fs;

use indoc::formatdoc;
use tempfile::TempDir;

use crate::{get_cmd_output, uptime, utc, write_session};

#[test]
fn test_ingest_from_a_toml_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let data = tmp_dir.path().join("data");
    fs::create_dir(&data).unwrap();
    write_session(&data, "inv", 64, utc(2017, 3, 28, 0, 0), utc(2017, 3, 28, 1, 0));
    let store = tmp_dir.path().join("sessions.sqlite");
    let args_file = tmp_dir.path().join("ingest.toml");
    fs::write(
        &args_file,
        formatdoc! {r#"
            dir = "{data}"

            [store]
            store = "{store}"
            quarantine_log = "{quarantine}"

            [decoding]
            num_workers = 2
            file_timeout = "1min"
        "#,
            data = data.display(),
            store = store.display(),
            quarantine = tmp_dir.path().join("bad.jsonl").display(),
        },
    )
    .unwrap();

    let cmd = uptime()
        .args([
            "ingest",
            &format!("{}", args_file.display()),
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "ingest failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("2 decode workers"), "{stdout}");
    assert!(stdout.contains("1 new sessions"), "{stdout}");
    assert!(store.exists());
}

#[test]
fn test_cli_overrides_a_json_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let args_file = tmp_dir.path().join("stats.json");
    fs::write(
        &args_file,
        formatdoc! {r#"
            {{
                "date": "2017-03-28",
                "store": "{missing}"
            }}
        "#,
            missing = tmp_dir.path().join("missing.sqlite").display(),
        },
    )
    .unwrap();

    // The file's store doesn't exist.
    let cmd = uptime()
        .args(["stats", &format!("{}", args_file.display())])
        .ok();
    assert!(cmd.is_err());

    // ... but the CLI's does.
    let data = tmp_dir.path().join("data");
    fs::create_dir(&data).unwrap();
    write_session(&data, "sas", 5, utc(2017, 3, 28, 0, 0), utc(2017, 3, 28, 1, 0));
    let store = format!("{}", tmp_dir.path().join("sessions.sqlite").display());
    #[rustfmt::skip]
    let cmd = uptime()
        .args([
            "ingest",
            "--dir", &format!("{}", data.display()),
            "--store", &store,
            "--quarantine-log", &format!("{}", tmp_dir.path().join("bad.jsonl").display()),
        ])
        .ok();
    assert!(cmd.is_ok(), "ingest failed: {}", cmd.err().unwrap());
    #[rustfmt::skip]
    let cmd = uptime()
        .args([
            "stats", &format!("{}", args_file.display()),
            "--store", &store,
        ])
        .ok();
    assert!(cmd.is_ok(), "stats failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Active 1h 0m"), "{stdout}");
}

#[test]
fn test_unknown_arg_file_extension() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let args_file = tmp_dir.path().join("args.yaml");
    fs::write(&args_file, "date: 2017-03-28\n").unwrap();
    let cmd = uptime()
        .args(["stats", &format!("{}", args_file.display())])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("toml, json"), "{stderr}");
}

#[test]
fn test_save_toml_round_trips() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let saved = tmp_dir.path().join("saved.toml");
    let data = tmp_dir.path().join("data");
    fs::create_dir(&data).unwrap();
    #[rustfmt::skip]
    let cmd = uptime()
        .args([
            "ingest",
            "--dir", &format!("{}", data.display()),
            "--store", &format!("{}", tmp_dir.path().join("s.sqlite").display()),
            "--quarantine-log", &format!("{}", tmp_dir.path().join("bad.jsonl").display()),
            "-j", "3",
            "--dry-run",
            "--save-toml", &format!("{}", saved.display()),
        ])
        .ok();
    assert!(cmd.is_ok(), "ingest failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Dry run -- exiting now."), "{stdout}");

    let contents = fs::read_to_string(&saved).unwrap();
    assert!(contents.contains("num_workers = 3"), "{contents}");

    // The saved file reproduces the run.
    let cmd = uptime()
        .args([&format!("{}", saved.display()), "--dry-run"])
        .ok();
    assert!(cmd.is_err(), "a subcommand is still needed");
    let cmd = uptime()
        .args(["ingest", &format!("{}", saved.display()), "--dry-run"])
        .ok();
    assert!(cmd.is_ok(), "ingest failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("3 decode workers"), "{stdout}");
}
