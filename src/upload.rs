use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::info;
use regex::Regex;
use rusqlite::Connection;

use crate::error::{Result, TillrollError};
use crate::ingest::{process_upload, IngestOptions};
use crate::jobs::{self, new_job_id, NewJob};
use crate::models::IngestSummary;
use crate::parser::FileKind;
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub original_name: String,
    pub tmp_path: PathBuf,
    pub size_bytes: u64,
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\- ]+").expect("static pattern"))
}

pub fn sanitize_name(name: &str) -> String {
    unsafe_chars().replace_all(name, "_").into_owned()
}

fn original_name(source: &Path) -> Result<String> {
    source
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| TillrollError::UnsupportedFileType(source.display().to_string()))
}

/// Reject wrong extensions and oversize files before anything is parsed.
pub fn check_upload(original_name: &str, size_bytes: u64, limit_bytes: u64) -> Result<FileKind> {
    let kind = FileKind::from_name(original_name)?;
    if size_bytes > limit_bytes {
        return Err(TillrollError::FileTooLarge {
            size: size_bytes,
            limit: limit_bytes,
        });
    }
    Ok(kind)
}

/// Copy an accepted file into the staging directory.
pub fn stage(settings: &Settings, source: &Path) -> Result<StagedUpload> {
    let name = original_name(source)?;
    let size_bytes = std::fs::metadata(source)?.len();
    check_upload(&name, size_bytes, settings.max_upload_bytes())?;

    let tmp_dir = settings.tmp_dir();
    std::fs::create_dir_all(&tmp_dir)?;
    let stamp = chrono::Utc::now().timestamp_millis();
    let tmp_path = tmp_dir.join(format!("{stamp}-{}", sanitize_name(&name)));
    std::fs::copy(source, &tmp_path)?;
    Ok(StagedUpload {
        original_name: name,
        tmp_path,
        size_bytes,
    })
}

/// Synchronous mode: ingest on the caller's thread.
pub fn ingest_now(conn: &Connection, settings: &Settings, source: &Path) -> Result<IngestSummary> {
    let name = original_name(source)?;
    let size_bytes = std::fs::metadata(source)?.len();
    check_upload(&name, size_bytes, settings.max_upload_bytes())?;
    process_upload(conn, source, &name, IngestOptions::from(settings))
}

/// Asynchronous mode: stage the file and queue a job for the workers.
pub fn enqueue(conn: &Connection, settings: &Settings, source: &Path) -> Result<String> {
    let staged = stage(settings, source)?;
    let id = new_job_id();
    let job = NewJob {
        id: id.clone(),
        original_name: staged.original_name.clone(),
        tmp_path: staged.tmp_path.to_string_lossy().to_string(),
        size_bytes: staged.size_bytes,
    };
    if let Err(e) = jobs::create(conn, &job) {
        let _ = std::fs::remove_file(&staged.tmp_path);
        return Err(e);
    }
    info!("Queued job {id} for {}", staged.original_name);
    Ok(id)
}
