// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests against command-line interfaces that aren't big enough to go in their
//! own modules.

use tempfile::TempDir;

use super::*;
use crate::site::SiteCode;

#[test]
fn test_date_args() {
    assert_eq!(
        DateArg::parse("2017-03-28").unwrap(),
        DateArg::Day(NaiveDate::from_ymd_opt(2017, 3, 28).unwrap())
    );
    assert_eq!(
        DateArg::parse(" 2017-3 ").unwrap(),
        DateArg::Month {
            year: 2017,
            month: 3
        }
    );
    assert_eq!(DateArg::month("2017-12").unwrap(), (2017, 12));
    assert_eq!(
        DateArg::day("2016-02-29").unwrap(),
        NaiveDate::from_ymd_opt(2016, 2, 29).unwrap()
    );

    assert!(matches!(
        DateArg::parse("28/03/2017"),
        Err(DateArgError::Unparsable(_))
    ));
    assert!(matches!(
        DateArg::parse("2017-02-29"),
        Err(DateArgError::Invalid(_))
    ));
    assert!(matches!(
        DateArg::parse("2017-13"),
        Err(DateArgError::Invalid(_))
    ));
    assert!(matches!(
        DateArg::day("2017-03"),
        Err(DateArgError::WantedDay(_))
    ));
    assert!(matches!(
        DateArg::month("2017-03-01"),
        Err(DateArgError::WantedMonth(_))
    ));
}

#[test]
fn test_parse_site() {
    assert_eq!(parse_site(None).unwrap(), SiteSelection::All);
    assert_eq!(parse_site(Some("ALL")).unwrap(), SiteSelection::All);
    assert_eq!(
        parse_site(Some("SAS")).unwrap(),
        SiteSelection::Site(SiteCode::new("sas").unwrap())
    );
    assert!(parse_site(Some("saskatoon")).is_err());
}

#[test]
fn test_cli_args_take_precedence() {
    let cli = WorkerArgs {
        num_workers: Some(2),
        ..Default::default()
    };
    let file = WorkerArgs {
        num_workers: Some(8),
        file_timeout: Some("5min".to_string()),
        ..Default::default()
    };
    let merged = cli.merge(file);
    assert_eq!(merged.num_workers, Some(2));
    assert_eq!(merged.file_timeout.as_deref(), Some("5min"));

    let result = merged.parse(false);
    assert!(result.is_ok(), "{:?}", result.err());
    let (config, _) = result.unwrap();
    assert_eq!(config.num_workers.get(), 2);
    assert_eq!(
        config.file_timeout,
        Some(std::time::Duration::from_secs(300))
    );
}

#[test]
fn test_bad_worker_args() {
    let args = WorkerArgs {
        num_workers: Some(0),
        ..Default::default()
    };
    assert!(matches!(args.parse(false), Err(ConfigError::ZeroWorkers)));
}

#[test]
fn test_store_args() {
    let tmp = TempDir::new().unwrap();
    let args = StoreArgs {
        store: Some(tmp.path().join("s.sqlite")),
        quarantine_log: None,
    }
    .merge(StoreArgs {
        store: Some(tmp.path().join("ignored.sqlite")),
        quarantine_log: Some(tmp.path().join("q.jsonl")),
    });
    assert_eq!(args.store_path(), tmp.path().join("s.sqlite"));
    assert_eq!(args.quarantine_path(), tmp.path().join("q.jsonl"));
    let result = args.open();
    assert!(result.is_ok(), "{:?}", result.err());
    assert!(tmp.path().join("s.sqlite").exists());

    assert_eq!(
        StoreArgs::default().store_path(),
        PathBuf::from(DEFAULT_STORE_PATH)
    );
}

#[test]
fn test_source_args() {
    let tmp = TempDir::new().unwrap();
    assert!(SourceArgs::default().parse().unwrap().is_none());

    let source = SourceArgs {
        endpoint: Some(tmp.path().to_path_buf()),
        sync_command: None,
    }
    .parse()
    .unwrap()
    .unwrap();
    assert!(source.describe().starts_with("local archive"));

    let result = SourceArgs {
        endpoint: Some(tmp.path().to_path_buf()),
        sync_command: Some("  ".to_string()),
    }
    .parse();
    assert!(matches!(result, Err(FetchError::EmptyCommand)));
}
