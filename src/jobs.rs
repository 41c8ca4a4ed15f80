use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{Result, TillrollError};
use crate::models::IngestSummary;

/// Stored error messages are cut to this many characters.
pub const MAX_ERROR_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = TillrollError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            other => Err(TillrollError::Storage(format!("unknown job status '{other}'"))),
        }
    }
}

/// Fields supplied by the caller when a job is queued.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub original_name: String,
    pub tmp_path: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadJob {
    pub id: String,
    pub original_name: String,
    pub tmp_path: String,
    pub size_bytes: u64,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<IngestSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub queued_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// The polling payload: `{id, status, result?, error?}`.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView<'a> {
    pub id: &'a str,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a IngestSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl UploadJob {
    pub fn status_view(&self) -> JobStatusView<'_> {
        JobStatusView {
            id: &self.id,
            status: self.status,
            result: self.result.as_ref(),
            error: self.error.as_deref(),
        }
    }
}

const JOB_COLUMNS: &str = "id, original_name, tmp_path, size_bytes, status, result_json, error, \
                           queued_at, started_at, finished_at";

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<(UploadJob, String, Option<String>)> {
    let status: String = row.get(4)?;
    let result_json: Option<String> = row.get(5)?;
    let size: i64 = row.get(3)?;
    let job = UploadJob {
        id: row.get(0)?,
        original_name: row.get(1)?,
        tmp_path: row.get(2)?,
        size_bytes: size.max(0) as u64,
        status: JobStatus::Queued,
        result: None,
        error: row.get(6)?,
        queued_at: row.get(7)?,
        started_at: row.get(8)?,
        finished_at: row.get(9)?,
    };
    Ok((job, status, result_json))
}

fn hydrate(parts: (UploadJob, String, Option<String>)) -> Result<UploadJob> {
    let (mut job, status, result_json) = parts;
    job.status = status.parse()?;
    job.result = result_json
        .map(|json| serde_json::from_str(&json))
        .transpose()?;
    Ok(job)
}

pub fn new_job_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn truncate_chars(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Queue operations
// ---------------------------------------------------------------------------

pub fn create(conn: &Connection, job: &NewJob) -> Result<()> {
    conn.execute(
        "INSERT INTO upload_jobs (id, original_name, tmp_path, size_bytes, status) VALUES (?1, ?2, ?3, ?4, 'queued')",
        params![job.id, job.original_name, job.tmp_path, job.size_bytes as i64],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<UploadJob>> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM upload_jobs WHERE id = ?1");
    conn.query_row(&sql, [id], job_from_row)
        .optional()?
        .map(hydrate)
        .transpose()
}

/// Oldest queued job, FIFO by queue time.
pub fn peek_next(conn: &Connection) -> Result<Option<UploadJob>> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM upload_jobs WHERE status = 'queued' ORDER BY queued_at, seq LIMIT 1"
    );
    conn.query_row(&sql, [], job_from_row)
        .optional()?
        .map(hydrate)
        .transpose()
}

/// Jobs left in `processing`, oldest start first. At worker start-up these can only be
/// leftovers from a worker that died mid-job.
pub fn stranded(conn: &Connection) -> Result<Vec<UploadJob>> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM upload_jobs WHERE status = 'processing' ORDER BY started_at, seq"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], job_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(hydrate).collect()
}

fn current_status(conn: &Connection, id: &str) -> Result<JobStatus> {
    let status: Option<String> = conn
        .query_row("SELECT status FROM upload_jobs WHERE id = ?1", [id], |r| r.get(0))
        .optional()?;
    status
        .ok_or_else(|| TillrollError::JobNotFound(id.to_string()))?
        .parse()
}

fn rejected(conn: &Connection, id: &str, to: JobStatus) -> TillrollError {
    match current_status(conn, id) {
        Ok(from) => TillrollError::InvalidTransition {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        },
        Err(e) => e,
    }
}

/// `queued|processing → processing`. Re-claiming a processing job is allowed so a
/// restarted worker can pick up where a crashed one stopped.
pub fn start(conn: &Connection, id: &str) -> Result<()> {
    let sql = format!(
        "UPDATE upload_jobs SET status = 'processing', started_at = {NOW}, error = NULL
         WHERE id = ?1 AND status IN ('queued', 'processing')"
    );
    if conn.execute(&sql, [id])? == 0 {
        return Err(rejected(conn, id, JobStatus::Processing));
    }
    Ok(())
}

/// Atomically take the oldest queued job and mark it processing.
pub fn claim(conn: &Connection) -> Result<Option<UploadJob>> {
    let tx = rusqlite::Transaction::new_unchecked(conn, rusqlite::TransactionBehavior::Immediate)?;
    let Some(job) = peek_next(&tx)? else {
        return Ok(None);
    };
    start(&tx, &job.id)?;
    let claimed = get(&tx, &job.id)?;
    tx.commit()?;
    Ok(claimed)
}

pub fn finish(conn: &Connection, id: &str, result: &IngestSummary) -> Result<()> {
    let json = serde_json::to_string(result)?;
    let sql = format!(
        "UPDATE upload_jobs SET status = 'done', finished_at = {NOW}, result_json = ?2, error = NULL
         WHERE id = ?1 AND status = 'processing'"
    );
    if conn.execute(&sql, params![id, json])? == 0 {
        return Err(rejected(conn, id, JobStatus::Done));
    }
    Ok(())
}

pub fn fail(conn: &Connection, id: &str, error: &str) -> Result<()> {
    let message = truncate_chars(error, MAX_ERROR_CHARS);
    let sql = format!(
        "UPDATE upload_jobs SET status = 'error', finished_at = {NOW}, error = ?2
         WHERE id = ?1 AND status IN ('queued', 'processing')"
    );
    if conn.execute(&sql, params![id, message])? == 0 {
        return Err(rejected(conn, id, JobStatus::Error));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Client-side polling
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum PollOutcome {
    Finished(UploadJob),
    /// The deadline passed; the job keeps running server-side.
    TimedOut(UploadJob),
}

pub fn wait_for_job(
    conn: &Connection,
    id: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<PollOutcome> {
    let deadline = Instant::now() + timeout;
    loop {
        let job = get(conn, id)?.ok_or_else(|| TillrollError::JobNotFound(id.to_string()))?;
        if job.status.is_terminal() {
            return Ok(PollOutcome::Finished(job));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(PollOutcome::TimedOut(job));
        }
        std::thread::sleep(interval.min(deadline - now));
    }
}
