use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{Subdepartment, Transaction, UploadMeta};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS raw_transactions (
    id INTEGER PRIMARY KEY,
    date_iso TEXT NOT NULL,
    item_code TEXT NOT NULL,
    item_brand TEXT,
    item_pos_desc TEXT,
    subdept_no INTEGER,
    subdept_desc TEXT,
    category_no INTEGER,
    category_desc TEXT,
    vendor_id TEXT,
    vendor_name TEXT,
    units_sum REAL NOT NULL DEFAULT 0,
    amount_sum REAL NOT NULL DEFAULT 0,
    weight_volume_sum REAL NOT NULL DEFAULT 0,
    bl_profit REAL DEFAULT 0,
    bl_margin REAL DEFAULT 0,
    bl_rank REAL DEFAULT 0,
    bl_ratio REAL DEFAULT 0,
    prop_rank REAL DEFAULT 0,
    prop_ratio REAL DEFAULT 0,
    source_filename TEXT,
    content_hash TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_raw_transactions_date ON raw_transactions(date_iso);
CREATE INDEX IF NOT EXISTS idx_raw_transactions_item ON raw_transactions(item_code);
CREATE INDEX IF NOT EXISTS idx_raw_transactions_subdept ON raw_transactions(subdept_no);

CREATE TABLE IF NOT EXISTS subdepartments (
    subdept_no INTEGER PRIMARY KEY,
    subdept_desc TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS upload_meta (
    id INTEGER PRIMARY KEY,
    file_name TEXT NOT NULL,
    uploaded_at TEXT DEFAULT (datetime('now')),
    rows_parsed INTEGER NOT NULL,
    inserted INTEGER NOT NULL,
    ignored INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS upload_jobs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    original_name TEXT NOT NULL,
    tmp_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued'
        CHECK (status IN ('queued', 'processing', 'done', 'error')),
    result_json TEXT,
    error TEXT,
    queued_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    started_at TEXT,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_upload_jobs_status ON upload_jobs(status, queued_at);
";

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn count_transactions(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM raw_transactions", [], |r| r.get(0))?)
}

/// Insert one batch inside a single transaction. Rows whose content hash is already
/// stored are ignored. Returns how many rows were actually written.
pub fn insert_transactions(conn: &Connection, rows: &[Transaction]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0usize;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO raw_transactions (
                date_iso, item_code, item_brand, item_pos_desc,
                subdept_no, subdept_desc, category_no, category_desc,
                vendor_id, vendor_name, units_sum, amount_sum, weight_volume_sum,
                bl_profit, bl_margin, bl_rank, bl_ratio, prop_rank, prop_ratio,
                source_filename, content_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        )?;
        for r in rows {
            inserted += stmt.execute(params![
                r.date_iso,
                r.item_code,
                r.item_brand,
                r.item_pos_desc,
                r.subdept_no,
                r.subdept_desc,
                r.category_no,
                r.category_desc,
                r.vendor_id,
                r.vendor_name,
                r.units_sum,
                r.amount_sum,
                r.weight_volume_sum,
                r.bl_profit,
                r.bl_margin,
                r.bl_rank,
                r.bl_ratio,
                r.prop_rank,
                r.prop_ratio,
                r.source_filename,
                r.content_hash,
            ])?;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

/// Last writer wins on the description.
pub fn upsert_subdepartments(conn: &Connection, pairs: &[Subdepartment]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO subdepartments (subdept_no, subdept_desc) VALUES (?1, ?2)
             ON CONFLICT(subdept_no) DO UPDATE SET subdept_desc = excluded.subdept_desc",
        )?;
        for p in pairs {
            stmt.execute(params![p.subdept_no, p.subdept_desc])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn insert_upload_meta(
    conn: &Connection,
    file_name: &str,
    rows_parsed: usize,
    inserted: usize,
    ignored: usize,
) -> Result<()> {
    conn.execute(
        "INSERT INTO upload_meta (file_name, rows_parsed, inserted, ignored) VALUES (?1, ?2, ?3, ?4)",
        params![file_name, rows_parsed as i64, inserted as i64, ignored as i64],
    )?;
    Ok(())
}

/// Most recent audit rows first.
pub fn recent_uploads(conn: &Connection, limit: usize) -> Result<Vec<UploadMeta>> {
    let mut stmt = conn.prepare(
        "SELECT id, file_name, COALESCE(uploaded_at, ''), rows_parsed, inserted, ignored
         FROM upload_meta ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit as i64], |row| {
        Ok(UploadMeta {
            id: row.get(0)?,
            file_name: row.get(1)?,
            uploaded_at: row.get(2)?,
            rows_parsed: row.get(3)?,
            inserted: row.get(4)?,
            ignored: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn optimize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA analysis_limit=400; PRAGMA optimize; ANALYZE;")?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}
