// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The ingestion pipeline.
//!
//! Candidate files are fed through a bounded channel to a pool of decode
//! workers. Each worker decodes and validates one file at a time and passes
//! the outcome to a single writer thread, which owns every store write and
//! quarantine append. Store writes are batched into transactions; the store's
//! unique key makes re-ingestion (or racing with another process) report
//! duplicates rather than errors.

mod error;

pub use error::IngestError;

use std::{
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self, ScopedJoinHandle},
    time::Duration,
};

use chrono::{NaiveDate, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError};
use crossbeam_utils::atomic::AtomicCell;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, trace, warn};
use scopeguard::defer_on_unwind;
use serde::Serialize;

use crate::{
    config::IngestConfig,
    decode::SessionDecode,
    fetch::FileSource,
    io::list_files,
    quarantine::{FailureReason, QuarantineEntry, QuarantineLog},
    record::{DecodedSession, SessionRecord},
    site::SiteCode,
    store::{MetadataStore, UpsertOutcome},
};

/// What to ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestScope {
    File(PathBuf),

    /// Every regular file directly inside a directory.
    Directory(PathBuf),

    /// A day of files from the ingester's [`FileSource`], for one site or all
    /// of them.
    Day {
        date: NaiveDate,
        site: Option<SiteCode>,
    },
}

impl std::fmt::Display for IngestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestScope::File(p) => write!(f, "file {}", p.display()),
            IngestScope::Directory(p) => write!(f, "directory {}", p.display()),
            IngestScope::Day {
                date,
                site: Some(site),
            } => write!(f, "{date} ({site})"),
            IngestScope::Day { date, site: None } => write!(f, "{date} (all sites)"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Files the decoder accepts.
    pub candidates: usize,

    /// Sessions newly written to the store.
    pub ingested: usize,

    /// Sessions that were already in the store.
    pub duplicate: usize,

    /// Files written to the quarantine log.
    pub quarantined: usize,

    /// Stored sessions that failed the data-anomaly checks (a subset of
    /// `ingested` and `duplicate`).
    pub anomalous: usize,

    /// Files in the scope that the decoder doesn't accept.
    pub skipped: usize,

    /// Files whose decode exceeded the per-file timeout. These are also
    /// quarantined.
    pub stuck: Vec<PathBuf>,

    /// Was the scope cancelled before every candidate was processed?
    pub cancelled: bool,
}

impl IngestReport {
    /// The number of candidates that were processed to completion.
    pub fn processed(&self) -> usize {
        self.ingested + self.duplicate + self.quarantined
    }

    /// Add another report's counts to this one.
    pub fn merge(&mut self, other: &IngestReport) {
        self.candidates += other.candidates;
        self.ingested += other.ingested;
        self.duplicate += other.duplicate;
        self.quarantined += other.quarantined;
        self.anomalous += other.anomalous;
        self.skipped += other.skipped;
        self.stuck.extend(other.stuck.iter().cloned());
        self.cancelled |= other.cancelled;
    }
}

/// What a worker hands to the writer.
enum FileOutcome {
    Decoded(SessionRecord),
    Failed { entry: QuarantineEntry, stuck: bool },
}

pub struct Ingester {
    config: IngestConfig,
    store: Arc<MetadataStore>,
    quarantine: Arc<QuarantineLog>,
    decoder: Arc<dyn SessionDecode>,
    source: Option<Arc<dyn FileSource>>,
}

impl Ingester {
    pub fn new(
        config: IngestConfig,
        store: Arc<MetadataStore>,
        quarantine: Arc<QuarantineLog>,
        decoder: Arc<dyn SessionDecode>,
    ) -> Ingester {
        Ingester {
            config,
            store,
            quarantine,
            decoder,
            source: None,
        }
    }

    /// Where [`IngestScope::Day`] scopes get their files from.
    pub fn with_source(mut self, source: Arc<dyn FileSource>) -> Ingester {
        self.source = Some(source);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    pub fn source(&self) -> Option<&Arc<dyn FileSource>> {
        self.source.as_ref()
    }

    pub fn ingest(&self, scope: &IngestScope) -> Result<IngestReport, IngestError> {
        self.ingest_with_cancel(scope, &AtomicCell::new(false))
    }

    /// Ingest a scope, checking `cancel` before each file. A cancelled scope
    /// still returns a report; files already handed to the writer are stored
    /// or quarantined, nothing else is touched.
    pub fn ingest_with_cancel(
        &self,
        scope: &IngestScope,
        cancel: &AtomicCell<bool>,
    ) -> Result<IngestReport, IngestError> {
        let files = self.resolve(scope)?;
        let (candidates, skipped): (Vec<PathBuf>, Vec<PathBuf>) =
            files.into_iter().partition(|f| self.decoder.accepts(f));
        for f in &skipped {
            trace!("Skipping {}", f.display());
        }
        let mut report = IngestReport {
            candidates: candidates.len(),
            skipped: skipped.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            info!("Nothing to ingest for {scope}");
            return Ok(report);
        }

        let num_workers = self.config.num_workers.get().min(candidates.len());
        info!(
            "Ingesting {} files for {scope} with {num_workers} workers",
            candidates.len()
        );
        self.run_pipeline(&candidates, num_workers, cancel, &mut report)?;
        report.cancelled = cancel.load() && report.processed() < report.candidates;
        if report.cancelled {
            warn!(
                "Ingestion of {scope} was cancelled after {} of {} files",
                report.processed(),
                report.candidates
            );
        }
        Ok(report)
    }

    fn resolve(&self, scope: &IngestScope) -> Result<Vec<PathBuf>, IngestError> {
        match scope {
            IngestScope::File(f) => {
                if f.is_file() {
                    Ok(vec![f.clone()])
                } else {
                    Err(IngestError::ScopeUnavailable(f.clone()))
                }
            }
            IngestScope::Directory(d) => {
                if !d.is_dir() {
                    return Err(IngestError::ScopeUnavailable(d.clone()));
                }
                Ok(list_files(d)?)
            }
            IngestScope::Day { date, site } => {
                let source = self.source.as_ref().ok_or(IngestError::NoFileSource)?;
                debug!("Getting files for {date} from {}", source.describe());
                Ok(source.candidates(site.as_ref(), *date)?)
            }
        }
    }

    fn run_pipeline(
        &self,
        candidates: &[PathBuf],
        num_workers: usize,
        cancel: &AtomicCell<bool>,
        report: &mut IngestReport,
    ) -> Result<(), IngestError> {
        let (tx_jobs, rx_jobs) = bounded::<&Path>(num_workers * 2);
        let (tx_outcomes, rx_outcomes) = bounded::<FileOutcome>(num_workers * 2);

        // Progress bars.
        let multi_progress = MultiProgress::with_draw_target(if self.config.show_progress {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        });
        let decode_progress = multi_progress.add(progress_bar(candidates.len(), "Decoding"));
        let write_progress = multi_progress.add(progress_bar(candidates.len(), "Storing"));

        // Use a variable to track whether any threads have an issue.
        let error = AtomicCell::new(false);

        thread::scope(|scope| {
            let mut worker_handles: Vec<ScopedJoinHandle<()>> = Vec::with_capacity(num_workers);
            for _ in 0..num_workers {
                let rx_jobs = rx_jobs.clone();
                let tx_outcomes = tx_outcomes.clone();
                let (error, decode_progress) = (&error, &decode_progress);
                let handle = thread::Builder::new()
                    .name("decode".to_string())
                    .spawn_scoped(scope, move || {
                        defer_on_unwind! { error.store(true); }
                        for path in rx_jobs.iter() {
                            if cancel.load() || error.load() {
                                break;
                            }
                            let outcome = self.process_file(path);
                            decode_progress.inc(1);
                            // The writer has gone away; it has hit an error.
                            if tx_outcomes.send(outcome).is_err() {
                                break;
                            }
                        }
                    })?;
                worker_handles.push(handle);
            }
            // Only the workers hold these now.
            drop(rx_jobs);
            drop(tx_outcomes);

            let write_handle: ScopedJoinHandle<Result<IngestReport, IngestError>> =
                thread::Builder::new()
                    .name("write".to_string())
                    .spawn_scoped(scope, || {
                        defer_on_unwind! { error.store(true); }
                        let result = self.write_outcomes(rx_outcomes, &write_progress);
                        if result.is_err() {
                            error.store(true);
                        }
                        result
                    })?;

            for path in candidates {
                if cancel.load() || error.load() {
                    break;
                }
                if tx_jobs.send(path.as_path()).is_err() {
                    break;
                }
            }
            drop(tx_jobs);

            for handle in worker_handles {
                handle
                    .join()
                    .map_err(|_| IngestError::WorkerPanicked("decode"))?;
            }
            decode_progress.abandon_with_message("Finished decoding");
            let written = write_handle
                .join()
                .map_err(|_| IngestError::WorkerPanicked("write"))??;
            report.merge(&written);
            Ok(())
        })
    }

    /// Decode and validate one file. Never fails; failures become quarantine
    /// entries.
    fn process_file(&self, path: &Path) -> FileOutcome {
        trace!("Decoding {}", path.display());
        let decoded = match self.config.file_timeout {
            None => decode_catching_panics(&*self.decoder, path),
            Some(timeout) => match decode_with_timeout(&self.decoder, path, timeout) {
                TimedDecode::Done(result) => result,
                TimedDecode::TimedOut => {
                    warn!(
                        "Decoding {} took longer than {timeout:?}; moving on",
                        path.display()
                    );
                    return FileOutcome::Failed {
                        entry: QuarantineEntry::new(
                            path,
                            FailureReason::Timeout,
                            format!("decode did not finish within {timeout:?}"),
                            Utc::now(),
                        ),
                        stuck: true,
                    };
                }
            },
        };
        let failed = |reason, detail: String| FileOutcome::Failed {
            entry: QuarantineEntry::new(path, reason, detail, Utc::now()),
            stuck: false,
        };
        match decoded {
            Ok(session) => match session.validate(path) {
                Ok(record) => FileOutcome::Decoded(record),
                Err(e) => failed(e.reason(), e.to_string()),
            },
            Err((reason, detail)) => failed(reason, detail),
        }
    }

    /// Runs on the writer thread. Returns the counts of everything written.
    fn write_outcomes(
        &self,
        rx: crossbeam_channel::Receiver<FileOutcome>,
        progress: &ProgressBar,
    ) -> Result<IngestReport, IngestError> {
        progress.tick();
        let batch_size = self.config.write_batch_size.get();
        let mut report = IngestReport::default();
        let mut batch: Vec<SessionRecord> = Vec::with_capacity(batch_size);

        for outcome in rx.iter() {
            match outcome {
                FileOutcome::Decoded(record) => {
                    batch.push(record);
                    if batch.len() >= batch_size {
                        self.flush(&mut batch, &mut report)?;
                    }
                }
                FileOutcome::Failed { entry, stuck } => {
                    debug!("Quarantining {} ({}): {}", entry.file, entry.reason, entry.detail);
                    self.quarantine.append(&entry)?;
                    report.quarantined += 1;
                    if stuck {
                        report.stuck.push(PathBuf::from(&entry.file));
                    }
                }
            }
            progress.inc(1);
        }
        self.flush(&mut batch, &mut report)?;
        progress.abandon_with_message("Finished storing");
        Ok(report)
    }

    fn flush(
        &self,
        batch: &mut Vec<SessionRecord>,
        report: &mut IngestReport,
    ) -> Result<(), IngestError> {
        if batch.is_empty() {
            return Ok(());
        }
        let outcomes = self.store.upsert_batch(batch)?;
        for (record, outcome) in batch.iter().zip(outcomes) {
            match outcome {
                UpsertOutcome::Inserted => report.ingested += 1,
                UpsertOutcome::Duplicate => {
                    debug!("{} {} is already stored", record.site, record.start);
                    report.duplicate += 1;
                }
            }
            if !record.experiment.data_consistent {
                report.anomalous += 1;
            }
        }
        batch.clear();
        Ok(())
    }
}

fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template(
            "{msg:18}: [{wide_bar:.blue}] {pos:2}/{len:2} files ({elapsed_precise}<{eta_precise})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    ProgressBar::new(len as _)
        .with_style(style)
        .with_position(0)
        .with_message(message)
}

type DecodeResult = Result<DecodedSession, (FailureReason, String)>;

fn decode_catching_panics(decoder: &dyn SessionDecode, path: &Path) -> DecodeResult {
    match panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(path))) {
        Ok(Ok(session)) => Ok(session),
        Ok(Err(e)) => Err((e.reason(), e.to_string())),
        Err(_) => Err((
            FailureReason::DecoderPanicked,
            "the decoder panicked".to_string(),
        )),
    }
}

enum TimedDecode {
    Done(DecodeResult),
    TimedOut,
}

/// Decode on a helper thread, waiting at most `timeout`. A helper that never
/// finishes is abandoned.
fn decode_with_timeout(
    decoder: &Arc<dyn SessionDecode>,
    path: &Path,
    timeout: Duration,
) -> TimedDecode {
    let (tx, rx) = bounded(1);
    let decoder = Arc::clone(decoder);
    let owned_path = path.to_path_buf();
    let spawned = thread::Builder::new()
        .name("decode-timed".to_string())
        .spawn(move || {
            let result = decode_catching_panics(&*decoder, &owned_path);
            // Nobody is listening if we timed out.
            let _ = tx.send(result);
        });
    if let Err(e) = spawned {
        return TimedDecode::Done(Err((FailureReason::IoError, e.to_string())));
    }
    match rx.recv_timeout(timeout) {
        Ok(result) => TimedDecode::Done(result),
        Err(RecvTimeoutError::Timeout) => TimedDecode::TimedOut,
        Err(RecvTimeoutError::Disconnected) => TimedDecode::Done(Err((
            FailureReason::DecoderPanicked,
            "the decoder thread exited without a result".to_string(),
        ))),
    }
}
