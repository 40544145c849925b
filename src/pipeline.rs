//! The pipeline module runs the two directory-wide scan modes.
//!
//! Both modes share one shape. The discovered file list is loaded into a closed work queue, a pool
//! of `dop` workers drains it, and every worker output goes through one of three bounded channels:
//!
//! - results (catalog records or `(path, hash)` pairs), drained by a collector thread;
//! - cache writes, drained by the calling thread, which owns the run's single [`StoreBatch`];
//! - progress increments, drained by the thread that owns the progress reporter.
//!
//! Workers never touch the database. Lookups go against in-memory snapshots taken before the run
//! starts, and all writes are serialized through the batch, which is committed once at the end.
//!
//! A file that fails to read or hash is logged and skipped. Only store failures and panics abort a
//! run.
use crate::error::{Result, SmartError, SmartExpectedError};
use crate::files::find_audio_files;
use crate::fingerprint::hash_file;
use crate::progress::{ProgressFactory, ProgressReporter};
use crate::store::{Store, StoreBatch};
use crate::tracks::{parse_track, TagReader, Track};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, info, warn};

/// Capacity of each result channel. Workers block briefly when a consumer falls this far behind.
const RESULT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSettings {
    pub reparse: bool,
    pub dop: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordSummary {
    /// Rows written to the catalog, reused ones included.
    pub recorded: usize,
    /// Rows carried over from the catalog without reading the file.
    pub reused: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindNewSettings {
    pub rehash: bool,
    pub dop: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FindNewReport {
    /// Files whose content hash is not in the catalog, sorted.
    pub new_files: Vec<PathBuf>,
    pub hashed: usize,
    pub cache_hits: usize,
    pub skipped: usize,
}

/// Record every audio file under `directory` into the catalog.
///
/// A file that already has a catalog row under the same path keeps that row as-is unless
/// `settings.reparse` is set. Every other file is hashed and has its tags read through `reader`.
pub fn record(
    store: &mut Store,
    directory: &Path,
    settings: RecordSettings,
    reader: &dyn TagReader,
    progress: &dyn ProgressFactory,
) -> Result<RecordSummary> {
    check_dop(settings.dop)?;
    let paths = find_audio_files(directory)?;
    info!("recording {} audio files under {}", paths.len(), directory.display());

    let existing: HashMap<PathBuf, Track> = if settings.reparse {
        HashMap::new()
    } else {
        store.tracks()?.into_iter().map(|t| (t.path.clone(), t)).collect()
    };
    debug!("loaded {} existing catalog rows", existing.len());

    let reused = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let reporter = progress.start(paths.len() as u64, "Recording");

    let batch = store.begin()?;
    let records = scan(
        &batch,
        paths,
        settings.dop,
        reporter,
        |path, sinks: &Sinks<Track>| {
            if let Some(track) = existing.get(&path) {
                reused.fetch_add(1, Ordering::Relaxed);
                sinks.result(track.clone());
            } else {
                match parse_track(&path, reader) {
                    Ok(track) => {
                        sinks.cache_write(track.path.clone(), track.hash.clone());
                        sinks.result(track);
                    }
                    Err(e) => {
                        warn!("skipping {}: {}", path.display(), e);
                        skipped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            sinks.tick();
        },
        |rx| rx.into_iter().collect::<Vec<_>>(),
    )?;
    batch.upsert_tracks(&records)?;
    batch.commit()?;

    let summary = RecordSummary {
        recorded: records.len(),
        reused: reused.into_inner(),
        skipped: skipped.into_inner(),
    };
    info!(
        "recorded {} tracks ({} reused, {} skipped)",
        summary.recorded, summary.reused, summary.skipped
    );
    Ok(summary)
}

/// Find the audio files under `directory` whose content is not already in the catalog.
///
/// Hashes come from the fingerprint cache where possible. `settings.rehash` ignores the cache and
/// hashes every file again; freshly computed hashes are written back to the cache either way.
pub fn find_new(
    store: &mut Store,
    directory: &Path,
    settings: FindNewSettings,
    progress: &dyn ProgressFactory,
) -> Result<FindNewReport> {
    check_dop(settings.dop)?;
    let paths = find_audio_files(directory)?;
    info!("checking {} audio files under {}", paths.len(), directory.display());

    let known = store.known_hashes()?;
    let cached = if settings.rehash {
        HashMap::new()
    } else {
        store.cached_hashes()?
    };
    debug!("loaded {} catalog hashes and {} cached fingerprints", known.len(), cached.len());

    let hashed = AtomicUsize::new(0);
    let cache_hits = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let reporter = progress.start(paths.len() as u64, "Hashing");

    let batch = store.begin()?;
    let known = &known;
    let mut new_files = scan(
        &batch,
        paths,
        settings.dop,
        reporter,
        |path, sinks: &Sinks<(PathBuf, String)>| {
            let hash = match cached.get(&path) {
                Some(hash) => {
                    cache_hits.fetch_add(1, Ordering::Relaxed);
                    Some(hash.clone())
                }
                None => match hash_file(&path) {
                    Ok(hash) => {
                        hashed.fetch_add(1, Ordering::Relaxed);
                        sinks.cache_write(path.clone(), hash.clone());
                        Some(hash)
                    }
                    Err(e) => {
                        warn!("skipping {}: {}", path.display(), e);
                        skipped.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                },
            };
            if let Some(hash) = hash {
                sinks.result((path, hash));
            }
            sinks.tick();
        },
        move |rx| {
            rx.into_iter()
                .filter(|(_, hash)| !known.contains(hash))
                .map(|(path, _)| path)
                .collect::<Vec<_>>()
        },
    )?;
    batch.commit()?;
    new_files.sort();

    let report = FindNewReport {
        new_files,
        hashed: hashed.into_inner(),
        cache_hits: cache_hits.into_inner(),
        skipped: skipped.into_inner(),
    };
    info!(
        "found {} new files ({} hashed, {} from cache, {} skipped)",
        report.new_files.len(),
        report.hashed,
        report.cache_hits,
        report.skipped
    );
    Ok(report)
}

fn check_dop(dop: usize) -> Result<()> {
    if dop == 0 {
        return Err(SmartExpectedError::InvalidParallelism { dop }.into());
    }
    Ok(())
}

/// The output side of a worker. Sends only fail once the consuming end is gone, which happens when
/// the run is already aborting, so they are dropped silently.
struct Sinks<R> {
    results: Sender<R>,
    cache_writes: Sender<(PathBuf, String)>,
    progress: Sender<u64>,
}

impl<R> Sinks<R> {
    fn result(&self, result: R) {
        let _ = self.results.send(result);
    }

    fn cache_write(&self, path: PathBuf, hash: String) {
        let _ = self.cache_writes.send((path, hash));
    }

    fn tick(&self) {
        let _ = self.progress.send(1);
    }
}

/// Run `job` over every path and reduce the results with `collect`. Cache writes are applied to
/// `batch` on the calling thread as they arrive.
fn scan<R, A>(
    batch: &StoreBatch<'_>,
    paths: Vec<PathBuf>,
    dop: usize,
    reporter: Box<dyn ProgressReporter>,
    job: impl Fn(PathBuf, &Sinks<R>) + Sync,
    collect: impl FnOnce(Receiver<R>) -> A + Send,
) -> Result<A>
where
    R: Send,
    A: Send,
{
    thread::scope(|s| {
        let (results_tx, results_rx) = bounded::<R>(RESULT_BUFFER);
        let (cache_tx, cache_rx) = bounded::<(PathBuf, String)>(RESULT_BUFFER);
        let (progress_tx, progress_rx) = bounded::<u64>(RESULT_BUFFER);

        let collector = s.spawn(move || collect(results_rx));
        let ticker = s.spawn(move || {
            for n in progress_rx {
                reporter.advance(n);
            }
            reporter.finish();
        });
        let job = &job;
        let producer = s.spawn(move || {
            let sinks = Sinks {
                results: results_tx,
                cache_writes: cache_tx,
                progress: progress_tx,
            };
            fan_out(paths, dop, |path| job(path, &sinks))
        });

        let mut written = 0usize;
        for (path, hash) in cache_rx.iter() {
            batch.cache_hash(&path, &hash)?;
            written += 1;
        }
        debug!("queued {} fingerprint cache writes", written);

        producer.join().map_err(|_| SmartError::WorkerPanicked("scan worker"))??;
        ticker.join().map_err(|_| SmartError::WorkerPanicked("progress"))?;
        collector.join().map_err(|_| SmartError::WorkerPanicked("result collector"))
    })
}

/// Drain a closed queue of `paths` with `dop` workers on a dedicated pool. Returns once every path
/// has been handed to `job` and every worker has exited.
fn fan_out(paths: Vec<PathBuf>, dop: usize, job: impl Fn(PathBuf) + Sync) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(dop)
        .thread_name(|i| format!("smartmp3mgr-worker-{i}"))
        .build()?;

    let (work_tx, work_rx) = bounded::<PathBuf>(paths.len().max(1));
    for path in paths {
        work_tx
            .send(path)
            .map_err(|_| SmartError::Generic("work queue closed before the scan started".to_string()))?;
    }
    drop(work_tx);

    let job = &job;
    pool.scope(|s| {
        for _ in 0..dop {
            let work_rx = work_rx.clone();
            s.spawn(move |_| {
                for path in work_rx {
                    job(path);
                }
            });
        }
    });
    Ok(())
}
