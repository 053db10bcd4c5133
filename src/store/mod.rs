// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The session store: a SQLite table keyed by (site, start time).
//!
//! Uniqueness of the key is enforced by SQLite itself, so concurrent writers
//! (threads sharing one store, or separate processes sharing one file) can
//! never insert the same session twice. Whoever loses a race sees
//! [`UpsertOutcome::Duplicate`].

mod error;
#[cfg(test)]
mod tests;

pub use error::StoreError;

use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, trace};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    record::{ExperimentParams, SessionRecord},
    site::{SiteCode, SiteSelection},
    window::Window,
};

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS sessions (
    site             TEXT    NOT NULL,
    start_time       INTEGER NOT NULL,
    end_time         INTEGER NOT NULL,
    source_file      TEXT    NOT NULL,
    stid             INTEGER NOT NULL,
    cpid             INTEGER NOT NULL,
    cmd_name         TEXT    NOT NULL,
    cmd_args         TEXT    NOT NULL,
    min_nave         INTEGER NOT NULL,
    times_consistent INTEGER NOT NULL,
    data_consistent  INTEGER NOT NULL,
    min_tfreq        INTEGER NOT NULL,
    max_tfreq        INTEGER NOT NULL,
    xcf              INTEGER NOT NULL,
    PRIMARY KEY (site, start_time)
);
CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions (start_time);
"#;

const INSERT: &str = r#"
INSERT OR IGNORE INTO sessions (
    site, start_time, end_time, source_file, stid, cpid, cmd_name, cmd_args,
    min_nave, times_consistent, data_consistent, min_tfreq, max_tfreq, xcf
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
"#;

const COLUMNS: &str = "site, start_time, end_time, source_file, stid, cpid, cmd_name, cmd_args, \
                       min_nave, times_consistent, data_consistent, min_tfreq, max_tfreq, xcf";

/// How long to wait on a lock held by another process before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// A session with the same (site, start time) was already stored; nothing
    /// was changed.
    Duplicate,
}

pub struct MetadataStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl MetadataStore {
    /// Open (or create) a store file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<MetadataStore, StoreError> {
        let path = path.as_ref();
        debug!("Opening session store {}", path.display());
        let conn = Connection::open(path).map_err(|err| StoreError::Open {
            path: path.to_path_buf(),
            err,
        })?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// A store that lives only as long as this handle.
    pub fn open_in_memory() -> Result<MetadataStore, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<MetadataStore, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(MetadataStore {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// The store's file, if it has one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a session unless one with the same key is already stored.
    pub fn upsert(&self, record: &SessionRecord) -> Result<UpsertOutcome, StoreError> {
        let conn = self.lock();
        insert(&conn, record)
    }

    /// Insert many sessions in one transaction. Either all of the outcomes are
    /// returned, or nothing was written.
    pub fn upsert_batch(
        &self,
        records: &[SessionRecord],
    ) -> Result<Vec<UpsertOutcome>, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let outcomes = records
            .iter()
            .map(|r| insert(&tx, r))
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit()?;
        trace!("Committed {} sessions", records.len());
        Ok(outcomes)
    }

    /// All sessions of the selected site(s) that overlap `window`, ordered by
    /// start time (ties broken by site). The rows come from a single read
    /// transaction, so concurrent writes are either wholly visible or not at
    /// all.
    pub fn query(
        &self,
        selection: &SiteSelection,
        window: &Window,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let start = window.start().timestamp();
        let end = window.end().timestamp();
        let records = match selection {
            SiteSelection::Site(site) => {
                let mut stmt = tx.prepare_cached(&format!(
                    "SELECT {COLUMNS} FROM sessions \
                     WHERE site = ?1 AND start_time < ?3 AND end_time >= ?2 \
                     ORDER BY start_time, site"
                ))?;
                let rows = stmt.query_map(params![site.as_str(), start, end], row_to_record)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            SiteSelection::All => {
                let mut stmt = tx.prepare_cached(&format!(
                    "SELECT {COLUMNS} FROM sessions \
                     WHERE start_time < ?2 AND end_time >= ?1 \
                     ORDER BY start_time, site"
                ))?;
                let rows = stmt.query_map(params![start, end], row_to_record)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        tx.commit()?;
        records.into_iter().collect()
    }

    /// Every site with at least one stored session.
    pub fn sites(&self) -> Result<Vec<SiteCode>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached("SELECT DISTINCT site FROM sessions ORDER BY site")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut sites = vec![];
        for site in rows {
            let site = site?;
            sites.push(SiteCode::new(&site).map_err(|_| StoreError::BadSite(site))?);
        }
        Ok(sites)
    }

    /// Look up a single session by its key.
    pub fn get(
        &self,
        site: &SiteCode,
        start: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {COLUMNS} FROM sessions WHERE site = ?1 AND start_time = ?2"
        ))?;
        let row = stmt
            .query_row(params![site.as_str(), start.timestamp()], row_to_record)
            .optional()?;
        row.transpose()
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Write a consistent copy of the store to `dest`, which must not exist.
    pub fn snapshot_to(&self, dest: &Path) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute("VACUUM INTO ?1", params![dest.display().to_string()])?;
        Ok(())
    }
}

fn insert(conn: &Connection, r: &SessionRecord) -> Result<UpsertOutcome, StoreError> {
    let e = &r.experiment;
    let mut stmt = conn.prepare_cached(INSERT)?;
    let changed = stmt.execute(params![
        r.site.as_str(),
        r.start.timestamp(),
        r.end.timestamp(),
        r.source_file,
        e.stid,
        e.cpid,
        e.cmd_name,
        e.cmd_args,
        e.min_nave,
        e.times_consistent,
        e.data_consistent,
        e.min_tfreq,
        e.max_tfreq,
        e.xcf,
    ])?;
    Ok(if changed == 0 {
        UpsertOutcome::Duplicate
    } else {
        UpsertOutcome::Inserted
    })
}

/// Columns are read in the order of `COLUMNS`. Conversion problems that
/// SQLite can't know about (bad site codes, unrepresentable times) are kept
/// in the inner result.
fn row_to_record(row: &Row) -> rusqlite::Result<Result<SessionRecord, StoreError>> {
    let site: String = row.get(0)?;
    let start: i64 = row.get(1)?;
    let end: i64 = row.get(2)?;
    let experiment = ExperimentParams {
        stid: row.get(4)?,
        cpid: row.get(5)?,
        cmd_name: row.get(6)?,
        cmd_args: row.get(7)?,
        min_nave: row.get(8)?,
        times_consistent: row.get(9)?,
        data_consistent: row.get(10)?,
        min_tfreq: row.get(11)?,
        max_tfreq: row.get(12)?,
        xcf: row.get(13)?,
    };
    let source_file: String = row.get(3)?;

    let site = match SiteCode::new(&site) {
        Ok(s) => s,
        Err(_) => return Ok(Err(StoreError::BadSite(site))),
    };
    let (start, end) = match (from_unix(start), from_unix(end)) {
        (Some(s), Some(e)) => (s, e),
        _ => return Ok(Err(StoreError::BadTime { site, start, end })),
    };
    Ok(Ok(SessionRecord {
        site,
        start,
        end,
        source_file,
        experiment,
    }))
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
