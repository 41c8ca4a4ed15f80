use crate::cli::open_db;
use crate::db::{count_transactions, optimize, recent_uploads};
use crate::error::Result;
use crate::fmt::{format_bytes, grouped};
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Upload cap: {}", format_bytes(settings.max_upload_bytes()));

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `tillroll init` to set up.");
        return Ok(());
    }

    println!("DB size:    {}", format_bytes(std::fs::metadata(&db_path)?.len()));
    let conn = open_db(&settings)?;
    let rows = count_transactions(&conn)?;
    let subdepts: i64 = conn.query_row("SELECT count(*) FROM subdepartments", [], |r| r.get(0))?;
    let uploads: i64 = conn.query_row("SELECT count(*) FROM upload_meta", [], |r| r.get(0))?;

    println!();
    println!("Transactions:    {}", grouped(rows as f64, 0));
    println!("Subdepartments:  {subdepts}");
    println!("Uploads:         {uploads}");

    for u in recent_uploads(&conn, 3)? {
        println!(
            "  #{} {}  {}  parsed {}  inserted {}  ignored {}",
            u.id,
            u.uploaded_at, u.file_name, u.rows_parsed, u.inserted, u.ignored
        );
    }

    let mut stmt = conn.prepare("SELECT status, count(*) FROM upload_jobs GROUP BY status ORDER BY status")?;
    let counts = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if !counts.is_empty() {
        let line: Vec<String> = counts.iter().map(|(s, n)| format!("{s} {n}")).collect();
        println!("Jobs:            {}", line.join(", "));
    }
    Ok(())
}

pub fn optimize_db() -> Result<()> {
    let conn = open_db(&load_settings())?;
    optimize(&conn)?;
    println!("Optimized database");
    Ok(())
}
