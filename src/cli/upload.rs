use std::path::Path;
use std::time::Duration;

use crate::cli::open_db;
use crate::error::Result;
use crate::jobs::{self, PollOutcome};
use crate::models::IngestSummary;
use crate::settings::load_settings;
use crate::upload::{enqueue, ingest_now};

fn print_summary(summary: &IngestSummary) {
    println!("File:        {}", summary.file_name);
    println!("Rows parsed: {}", summary.rows_parsed);
    println!("Inserted:    {}", summary.inserted);
    println!("Ignored:     {}", summary.ignored);
    if !summary.sample_dates.is_empty() {
        println!("Dates:       {}", summary.sample_dates.join(", "));
    }
    println!("Elapsed:     {} ms", summary.elapsed_ms);
}

pub fn run(file: &str, queue: bool, wait: bool, timeout_secs: u64) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let source = Path::new(file);

    if !queue {
        let summary = ingest_now(&conn, &settings, source)?;
        print_summary(&summary);
        return Ok(());
    }

    let id = enqueue(&conn, &settings, source)?;
    println!("Queued job {id}");
    if !wait {
        return Ok(());
    }

    let interval = Duration::from_millis(settings.poll_interval_ms.max(50));
    match jobs::wait_for_job(&conn, &id, interval, Duration::from_secs(timeout_secs))? {
        PollOutcome::Finished(job) => {
            println!("{}", serde_json::to_string_pretty(&job.status_view())?);
        }
        PollOutcome::TimedOut(job) => {
            println!(
                "Job {id} still {} after {timeout_secs}s; check later with `tillroll job {id}`",
                job.status
            );
        }
    }
    Ok(())
}
