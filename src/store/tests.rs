// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{sync::Arc, thread};

use chrono::NaiveDate;
use tempfile::TempDir;

use super::*;
use crate::tests::*;

fn day() -> Window {
    Window::day(NaiveDate::from_ymd_opt(2017, 3, 28).unwrap())
}

fn sas() -> SiteSelection {
    SiteSelection::Site(SiteCode::new("sas").unwrap())
}

#[test]
fn test_upsert_is_idempotent() {
    let store = MetadataStore::open_in_memory().unwrap();
    let record = session_record("sas", utc(2017, 3, 28, 0, 0, 0), utc(2017, 3, 28, 2, 0, 0));

    let result = store.upsert(&record);
    assert!(result.is_ok(), "{:?}", result.unwrap_err());
    assert_eq!(result.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(store.upsert(&record).unwrap(), UpsertOutcome::Duplicate);
    assert_eq!(store.count().unwrap(), 1);

    // Same key but different contents is still a duplicate; the first write
    // wins.
    let mut other = record.clone();
    other.end = utc(2017, 3, 28, 3, 0, 0);
    assert_eq!(store.upsert(&other).unwrap(), UpsertOutcome::Duplicate);
    let stored = store.get(&record.site, record.start).unwrap().unwrap();
    assert_eq!(stored, record);
}

#[test]
fn test_query_is_ordered_and_filtered() {
    let store = MetadataStore::open_in_memory().unwrap();
    let records = vec![
        session_record("sas", utc(2017, 3, 28, 10, 0, 0), utc(2017, 3, 28, 10, 30, 0)),
        session_record("sas", utc(2017, 3, 28, 0, 0, 0), utc(2017, 3, 28, 2, 0, 0)),
        session_record("kod", utc(2017, 3, 28, 1, 0, 0), utc(2017, 3, 28, 3, 0, 0)),
        // Spans midnight into the day.
        session_record("sas", utc(2017, 3, 27, 23, 0, 0), utc(2017, 3, 28, 0, 30, 0)),
        // Entirely the next day.
        session_record("sas", utc(2017, 3, 29, 0, 0, 0), utc(2017, 3, 29, 1, 0, 0)),
    ];
    let outcomes = store.upsert_batch(&records).unwrap();
    assert!(outcomes.iter().all(|o| *o == UpsertOutcome::Inserted));

    let result = store.query(&sas(), &day());
    assert!(result.is_ok(), "{:?}", result.unwrap_err());
    let found = result.unwrap();
    let starts: Vec<_> = found.iter().map(|r| r.start).collect();
    assert_eq!(
        starts,
        vec![
            utc(2017, 3, 27, 23, 0, 0),
            utc(2017, 3, 28, 0, 0, 0),
            utc(2017, 3, 28, 10, 0, 0)
        ]
    );
    assert!(found.iter().all(|r| r.site.as_str() == "sas"));

    let all = store.query(&SiteSelection::All, &day()).unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.windows(2).all(|w| w[0].start <= w[1].start));

    assert_eq!(
        store.sites().unwrap(),
        vec![SiteCode::new("kod").unwrap(), SiteCode::new("sas").unwrap()]
    );
}

#[test]
fn test_batch_reports_duplicates_within_itself() {
    let store = MetadataStore::open_in_memory().unwrap();
    let record = session_record("inv", utc(2017, 3, 28, 4, 0, 0), utc(2017, 3, 28, 6, 0, 0));
    let outcomes = store
        .upsert_batch(&[record.clone(), record.clone()])
        .unwrap();
    assert_eq!(
        outcomes,
        vec![UpsertOutcome::Inserted, UpsertOutcome::Duplicate]
    );
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_store_survives_reopening() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("sessions.sqlite");
    let record = session_record("sas", utc(2017, 3, 28, 0, 0, 0), utc(2017, 3, 28, 2, 0, 0));
    {
        let store = MetadataStore::open(&path).unwrap();
        store.upsert(&record).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
    }
    let store = MetadataStore::open(&path).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.upsert(&record).unwrap(), UpsertOutcome::Duplicate);
}

#[test]
fn test_racing_writers_insert_once() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("sessions.sqlite");
    let shared = Arc::new(MetadataStore::open(&path).unwrap());
    let record = session_record("sas", utc(2017, 3, 28, 0, 0, 0), utc(2017, 3, 28, 2, 0, 0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let record = record.clone();
            // Half of the writers share a handle, the others have their own
            // connection to the same file.
            let store = if i % 2 == 0 {
                Arc::clone(&shared)
            } else {
                Arc::new(MetadataStore::open(&path).unwrap())
            };
            thread::spawn(move || store.upsert(&record).unwrap())
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == UpsertOutcome::Inserted)
            .count(),
        1
    );
    assert_eq!(shared.count().unwrap(), 1);
}

#[test]
fn test_snapshot() {
    let tmp = TempDir::new().unwrap();
    let store = MetadataStore::open(tmp.path().join("sessions.sqlite")).unwrap();
    store
        .upsert(&session_record(
            "sas",
            utc(2017, 3, 28, 0, 0, 0),
            utc(2017, 3, 28, 2, 0, 0),
        ))
        .unwrap();

    let dest = tmp.path().join("copy.sqlite");
    let result = store.snapshot_to(&dest);
    assert!(result.is_ok(), "{:?}", result.unwrap_err());
    let copy = MetadataStore::open(&dest).unwrap();
    assert_eq!(copy.count().unwrap(), 1);
}

#[test]
fn test_experiment_params_round_trip() {
    let store = MetadataStore::open_in_memory().unwrap();
    let mut record = session_record("bks", utc(2017, 3, 28, 0, 0, 0), utc(2017, 3, 28, 2, 0, 0));
    record.experiment = ExperimentParams {
        stid: 33,
        cpid: -3560,
        cmd_name: "themisscan".to_string(),
        cmd_args: "-camp 7".to_string(),
        min_nave: 12,
        times_consistent: false,
        data_consistent: false,
        min_tfreq: 10200,
        max_tfreq: 12400,
        xcf: 0,
    };
    store.upsert(&record).unwrap();
    let stored = store.get(&record.site, record.start).unwrap();
    assert_eq!(stored, Some(record));
}
