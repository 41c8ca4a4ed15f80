use crate::cli::open_db;
use crate::error::{Result, TillrollError};
use crate::jobs;
use crate::settings::load_settings;

pub fn run(id: &str) -> Result<()> {
    let conn = open_db(&load_settings())?;
    let job = jobs::get(&conn, id)?.ok_or_else(|| TillrollError::JobNotFound(id.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&job.status_view())?);
    Ok(())
}
