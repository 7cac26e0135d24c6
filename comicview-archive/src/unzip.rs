//! Parallel zip extraction.
//!
//! Entries are planned on the calling thread, then handed to a fixed pool of
//! workers, each holding its own archive handle. Workers report every entry
//! on one completion channel. After the first failure no further entries are
//! dispatched, but entries already handed out still run to completion and are
//! drained before returning, so the scratch directory may hold partial output
//! on error.
//!
//! Once the pool is full the dispatcher refills one slot per completion
//! rather than waiting for a whole batch to finish. Concurrency stays bounded
//! by the worker count either way.
//!
//! Errors reading an entry (bad checksum, truncated or undecodable data) are
//! zip errors; only failures creating or writing files under the scratch
//! directory are reported as i/o errors.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::ExtractError;
use crate::is_image_path;

struct Job {
    index: usize,
    target: PathBuf,
}

type Completion = Result<PathBuf, ExtractError>;

fn open(path: &Path) -> Result<ZipArchive<BufReader<File>>, ExtractError> {
    let file = File::open(path).map_err(ExtractError::io(path))?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

/// Creates directory entries and lists the image entries to extract.
fn plan<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    scratch: &Path,
) -> Result<Vec<Job>, ExtractError> {
    let mut jobs = Vec::new();
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping entry with unsafe path");
            continue;
        };
        let target = scratch.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(ExtractError::io(&target))?;
            continue;
        }
        if is_image_path(&target) {
            jobs.push(Job { index, target });
        }
    }
    Ok(jobs)
}

fn write_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, job: &Job) -> Completion {
    let mut entry = archive.by_index(job.index)?;
    if let Some(parent) = job.target.parent() {
        fs::create_dir_all(parent).map_err(ExtractError::io(parent))?;
    }
    let mut out = File::create(&job.target).map_err(ExtractError::io(&job.target))?;
    copy_entry(&mut entry, &mut out, &job.target)?;
    Ok(job.target.clone())
}

const COPY_CHUNK: usize = 64 * 1024;

/// Streams an entry to disk, keeping read failures apart from write failures.
fn copy_entry(
    entry: &mut impl Read,
    out: &mut impl Write,
    target: &Path,
) -> Result<(), ExtractError> {
    let mut buffer = vec![0u8; COPY_CHUNK];
    loop {
        let n = match entry.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ExtractError::Zip(ZipError::Io(e))),
        };
        out.write_all(&buffer[..n]).map_err(ExtractError::io(target))?;
    }
}

fn worker(path: &Path, jobs: Receiver<Job>, done: Sender<Completion>) {
    let mut handle: Option<ZipArchive<BufReader<File>>> = None;
    for job in jobs {
        let result = match handle.as_mut() {
            Some(archive) => write_entry(archive, &job),
            None => match open(path) {
                Ok(archive) => write_entry(handle.insert(archive), &job),
                Err(err) => Err(err),
            },
        };
        if done.send(result).is_err() {
            break;
        }
    }
}

fn record(
    completion: Completion,
    extracted: &mut Vec<PathBuf>,
    first_error: &mut Option<ExtractError>,
) {
    match completion {
        Ok(path) => extracted.push(path),
        Err(err) => {
            if first_error.is_none() {
                *first_error = Some(err);
            } else {
                debug!(error = %err, "additional extraction failure");
            }
        }
    }
}

/// Extracts the image entries of the zip at `path` into `scratch` using up to
/// `workers` threads. Output order is unspecified.
pub(crate) fn extract(
    path: &Path,
    scratch: &Path,
    workers: usize,
) -> Result<Vec<PathBuf>, ExtractError> {
    let jobs = {
        let mut archive = open(path)?;
        plan(&mut archive, scratch)?
    };
    if jobs.is_empty() {
        return Ok(Vec::new());
    }
    let workers = workers.clamp(1, jobs.len());
    debug!(entries = jobs.len(), workers, "extracting zip entries");

    let (job_tx, job_rx) = bounded::<Job>(workers);
    let (done_tx, done_rx) = unbounded::<Completion>();
    let mut extracted = Vec::with_capacity(jobs.len());
    let mut first_error = None;

    thread::scope(|scope| {
        for _ in 0..workers {
            let queue = job_rx.clone();
            let done = done_tx.clone();
            scope.spawn(move || worker(path, queue, done));
        }
        drop(job_rx);
        drop(done_tx);

        let mut outstanding = 0usize;
        for job in jobs {
            // the pool is full: wait for one entry before handing out another
            if outstanding == workers {
                let completion = done_rx.recv().unwrap_or(Err(ExtractError::WorkerLost));
                record(completion, &mut extracted, &mut first_error);
                outstanding -= 1;
                if first_error.is_some() {
                    break;
                }
            }
            if job_tx.send(job).is_err() {
                first_error.get_or_insert(ExtractError::WorkerLost);
                break;
            }
            outstanding += 1;
        }
        drop(job_tx);

        while outstanding > 0 {
            let completion = done_rx.recv().unwrap_or(Err(ExtractError::WorkerLost));
            record(completion, &mut extracted, &mut first_error);
            outstanding -= 1;
        }
    });

    match first_error {
        Some(err) => Err(err),
        None => Ok(extracted),
    }
}
