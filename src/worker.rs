use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info, warn};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::Result;
use crate::ingest::{process_upload, IngestOptions};
use crate::jobs::{self, UploadJob};
use crate::models::IngestSummary;
use crate::settings::Settings;

/// Completion notice sent to whoever holds the pool's receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Done { id: String, summary: IngestSummary },
    Failed { id: String, error: String },
}

impl JobEvent {
    pub fn id(&self) -> &str {
        match self {
            Self::Done { id, .. } | Self::Failed { id, .. } => id,
        }
    }
}

fn remove_staged(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove staged file {}: {e}", path.display());
        }
    }
}

/// Run the ingestion for an already-claimed job and persist its outcome.
pub fn run_job(conn: &Connection, job: &UploadJob, options: IngestOptions) -> Result<JobEvent> {
    let tmp_path = PathBuf::from(&job.tmp_path);
    info!("Job {}: ingesting {}", job.id, job.original_name);
    let outcome = process_upload(conn, &tmp_path, &job.original_name, options);
    remove_staged(&tmp_path);

    match outcome {
        Ok(summary) => {
            jobs::finish(conn, &job.id, &summary)?;
            Ok(JobEvent::Done {
                id: job.id.clone(),
                summary,
            })
        }
        Err(e) => {
            let message = e.to_string();
            error!("Job {} failed: {message}", job.id);
            jobs::fail(conn, &job.id, &message)?;
            Ok(JobEvent::Failed {
                id: job.id.clone(),
                error: message,
            })
        }
    }
}

/// Claim and run at most one queued job.
pub fn run_once(conn: &Connection, options: IngestOptions) -> Result<Option<JobEvent>> {
    match jobs::claim(conn)? {
        Some(job) => run_job(conn, &job, options).map(Some),
        None => Ok(None),
    }
}

fn rerun(conn: &Connection, stranded: Vec<UploadJob>, options: IngestOptions) -> Result<Vec<JobEvent>> {
    let mut events = Vec::new();
    for job in stranded {
        warn!("Job {} was left processing; running it again", job.id);
        jobs::start(conn, &job.id)?;
        events.push(run_job(conn, &job, options)?);
    }
    Ok(events)
}

/// Re-run every job a previous worker left in `processing`.
/// Call before polling starts; one worker process per database is assumed.
pub fn recover_stranded(conn: &Connection, options: IngestOptions) -> Result<Vec<JobEvent>> {
    rerun(conn, jobs::stranded(conn)?, options)
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    events: Receiver<JobEvent>,
}

struct WorkerContext {
    index: usize,
    db_path: PathBuf,
    options: IngestOptions,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    events: Sender<JobEvent>,
    stranded: Vec<UploadJob>,
}

fn worker_loop(mut ctx: WorkerContext) {
    let conn = match get_connection(&ctx.db_path) {
        Ok(conn) => conn,
        Err(e) => {
            error!("Worker {} could not open {}: {e}", ctx.index, ctx.db_path.display());
            return;
        }
    };
    debug!("Worker {} started", ctx.index);
    let stranded = std::mem::take(&mut ctx.stranded);
    if !stranded.is_empty() {
        match rerun(&conn, stranded, ctx.options) {
            Ok(events) => {
                for event in events {
                    let _ = ctx.events.send(event);
                }
            }
            Err(e) => error!("Worker {}: recovering stranded jobs failed: {e}", ctx.index),
        }
    }
    while !ctx.stop.load(Ordering::Relaxed) {
        match run_once(&conn, ctx.options) {
            Ok(Some(event)) => {
                // Nobody listening is fine; the job row already holds the outcome.
                let _ = ctx.events.send(event);
            }
            Ok(None) => std::thread::sleep(ctx.poll_interval),
            Err(e) => {
                error!("Worker {}: {e}", ctx.index);
                std::thread::sleep(ctx.poll_interval);
            }
        }
    }
    debug!("Worker {} stopped", ctx.index);
}

impl WorkerPool {
    pub fn start(db_path: &Path, settings: &Settings) -> Result<Self> {
        // Snapshot before any thread can claim, so only leftovers are re-run.
        let mut stranded = jobs::stranded(&get_connection(db_path)?)?;
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let threads = settings.worker_threads.max(1);
        let mut handles = Vec::with_capacity(threads);
        for index in 0..threads {
            let ctx = WorkerContext {
                index,
                db_path: db_path.to_path_buf(),
                options: IngestOptions::from(settings),
                poll_interval: Duration::from_millis(settings.poll_interval_ms),
                stop: Arc::clone(&stop),
                events: tx.clone(),
                stranded: std::mem::take(&mut stranded),
            };
            let handle = std::thread::Builder::new()
                .name(format!("tillroll-worker-{index}"))
                .spawn(move || worker_loop(ctx))?;
            handles.push(handle);
        }
        info!("Started {threads} ingestion worker(s) on {}", db_path.display());
        Ok(Self {
            handles,
            stop,
            events: rx,
        })
    }

    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    /// Stop polling and wait for every worker; a job in flight always completes.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.handles {
            if handle.join().is_err() {
                error!("A worker thread panicked");
            }
        }
    }
}
