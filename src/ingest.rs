use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::time::Instant;

use log::{debug, info, warn};
use rusqlite::Connection;

use crate::canonical::build_transaction;
use crate::db::{count_transactions, insert_transactions, insert_upload_meta, upsert_subdepartments};
use crate::error::{Result, TillrollError};
use crate::models::{IngestSummary, Subdepartment, Transaction};
use crate::parser::parse_uploaded_file;
use crate::settings::Settings;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub batch_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl From<&Settings> for IngestOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Batch writer
// ---------------------------------------------------------------------------

/// Buffers fact rows and commits them one transaction per full batch.
pub struct BatchWriter<'c> {
    conn: &'c Connection,
    batch_size: usize,
    pending: Vec<Transaction>,
    inserted: usize,
    committed: Vec<usize>,
}

impl<'c> BatchWriter<'c> {
    pub fn new(conn: &'c Connection, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            conn,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            inserted: 0,
            committed: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Transaction) -> Result<()> {
        self.pending.push(row);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let written = insert_transactions(self.conn, &self.pending)?;
        debug!("Committed batch of {} rows ({} new)", self.pending.len(), written);
        self.inserted += written;
        self.committed.push(self.pending.len());
        self.pending.clear();
        Ok(())
    }

    /// Flush the tail batch. Returns (rows written, size of each committed batch).
    pub fn finish(mut self) -> Result<(usize, Vec<usize>)> {
        self.flush()?;
        Ok((self.inserted, self.committed))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Parse, validate, coerce, hash and load one uploaded file.
pub fn process_upload(
    conn: &Connection,
    file_path: &Path,
    original_name: &str,
    options: IngestOptions,
) -> Result<IngestSummary> {
    let started = Instant::now();
    let parsed = parse_uploaded_file(file_path, original_name)?;
    if !parsed.accepted {
        return Err(TillrollError::HeaderValidation {
            missing: parsed.missing.iter().map(|h| h.to_string()).collect(),
        });
    }
    if !parsed.missing.is_empty() {
        info!(
            "{original_name}: optional columns absent, defaulting: {}",
            parsed.missing.join(", ")
        );
    }

    let before = count_transactions(conn)?;
    let mut writer = BatchWriter::new(conn, options.batch_size);
    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut sample_dates = BTreeSet::new();
    let mut seen_pairs = HashSet::new();
    let mut subdepartments = Vec::new();

    for row in &parsed.rows {
        let Some(txn) = build_transaction(row, original_name) else {
            skipped += 1;
            continue;
        };
        processed += 1;
        sample_dates.insert(txn.date_iso.clone());
        if txn.subdept_no != 0
            && !txn.subdept_desc.is_empty()
            && seen_pairs.insert((txn.subdept_no, txn.subdept_desc.clone()))
        {
            subdepartments.push(Subdepartment {
                subdept_no: txn.subdept_no,
                subdept_desc: txn.subdept_desc.clone(),
            });
        }
        writer.push(txn)?;
    }
    let (inserted, batches) = writer.finish()?;
    if skipped > 0 {
        debug!("{original_name}: skipped {skipped} rows with unreadable dates");
    }

    if !subdepartments.is_empty() {
        upsert_subdepartments(conn, &subdepartments)?;
    }

    let after = count_transactions(conn)?;
    let delta = usize::try_from(after - before).unwrap_or(0);
    if delta != inserted {
        warn!(
            "{original_name}: table grew by {delta} rows but this run wrote {inserted}; another writer was active"
        );
    }
    let ignored = processed - inserted;

    if let Err(e) = insert_upload_meta(conn, original_name, parsed.rows.len(), inserted, ignored) {
        warn!("{original_name}: could not record upload metadata: {e}");
    }

    let summary = IngestSummary {
        file_name: original_name.to_string(),
        rows_parsed: parsed.rows.len(),
        inserted,
        ignored,
        sample_dates: sample_dates.into_iter().collect(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        "{original_name}: {} rows parsed, {} inserted, {} ignored in {} batch(es), {} ms",
        summary.rows_parsed,
        summary.inserted,
        summary.ignored,
        batches.len(),
        summary.elapsed_ms
    );
    Ok(summary)
}
