use log::info;

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::grouped;
use crate::ingest::IngestOptions;
use crate::settings::load_settings;
use crate::worker::{recover_stranded, run_once, JobEvent, WorkerPool};

fn report(event: &JobEvent) {
    match event {
        JobEvent::Done { summary, .. } => println!(
            "{}  done   {}  inserted {}  ignored {}",
            event.id(),
            summary.file_name,
            grouped(summary.inserted as f64, 0),
            grouped(summary.ignored as f64, 0)
        ),
        JobEvent::Failed { error, .. } => println!("{}  error  {error}", event.id()),
    }
}

pub fn run(once: bool, threads: Option<usize>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(n) = threads {
        settings.worker_threads = n;
    }
    let conn = open_db(&settings)?;

    if once {
        let options = IngestOptions::from(&settings);
        let mut processed = 0;
        for event in recover_stranded(&conn, options)? {
            report(&event);
            processed += 1;
        }
        while let Some(event) = run_once(&conn, options)? {
            report(&event);
            processed += 1;
        }
        println!("Processed {processed} job(s)");
        return Ok(());
    }
    drop(conn);

    let pool = WorkerPool::start(&settings.db_path(), &settings)?;
    info!("Waiting for jobs; stop with Ctrl-C");
    for event in pool.events().iter() {
        report(&event);
    }
    pool.shutdown();
    Ok(())
}
