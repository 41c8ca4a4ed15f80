pub mod export;
pub mod init;
pub mod job;
pub mod range;
pub mod status;
pub mod subdepartments;
pub mod upload;
pub mod worker;

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::{Result, TillrollError};
use crate::reports::{DateRange, SubdeptFilter};
use crate::settings::Settings;

/// Open the configured database, creating the schema on first use.
pub(crate) fn open_db(settings: &Settings) -> Result<Connection> {
    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    Ok(conn)
}

#[derive(Parser)]
#[command(name = "tillroll", about = "Ingest point-of-sale item movement exports into SQLite.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for tillroll data (default: ~/Documents/tillroll)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Ingest a CSV or spreadsheet export.
    Upload {
        /// Path to a .csv, .xlsb, .xlsx or .xls file
        file: String,
        /// Queue the file for the background workers instead of ingesting now
        #[arg(long = "async")]
        queue: bool,
        /// With --async, poll the job until it finishes
        #[arg(long, requires = "queue")]
        wait: bool,
        /// Give up polling after this many seconds
        #[arg(long = "timeout-secs", default_value_t = 300)]
        timeout_secs: u64,
    },
    /// Process queued upload jobs.
    Worker {
        /// Drain the queue and exit instead of polling forever
        #[arg(long)]
        once: bool,
        /// Number of worker threads (overrides settings)
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Show the status of an upload job.
    Job {
        id: String,
    },
    /// List known subdepartments.
    Subdepartments,
    /// Aggregate item movement over a date window.
    Range {
        #[command(flatten)]
        filter: RangeArgs,
    },
    /// Write the item movement aggregate to CSV.
    Export {
        #[command(flatten)]
        filter: RangeArgs,
        /// Output file (default: <data-dir>/exports/item_movement_<start>_<end>.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Run SQLite's query planner maintenance.
    Optimize,
    /// Show data directory, database and queue counts.
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// First day, YYYY-MM-DD
    #[arg(long)]
    pub start: String,
    /// Last day, YYYY-MM-DD (inclusive)
    #[arg(long)]
    pub end: String,
    /// Single subdepartment number
    #[arg(long, conflicts_with_all = ["subdept_start", "subdept_end"])]
    pub subdept: Option<i64>,
    /// Lower bound of a subdepartment range
    #[arg(long = "subdept-start", requires = "subdept_end")]
    pub subdept_start: Option<i64>,
    /// Upper bound of a subdepartment range
    #[arg(long = "subdept-end", requires = "subdept_start")]
    pub subdept_end: Option<i64>,
    /// Restrict to these item codes (repeatable)
    #[arg(long = "upc")]
    pub upc: Vec<String>,
}

impl RangeArgs {
    pub fn date_range(&self) -> Result<DateRange> {
        DateRange::new(&self.start, &self.end)
    }

    pub fn subdept_filter(&self) -> Result<SubdeptFilter> {
        match (self.subdept, self.subdept_start, self.subdept_end) {
            (Some(no), _, _) => Ok(SubdeptFilter::One(no)),
            (None, Some(lo), Some(hi)) if lo <= hi => Ok(SubdeptFilter::Range(lo, hi)),
            (None, Some(lo), Some(hi)) => Err(TillrollError::Parse(format!(
                "subdepartment range {lo}..{hi} is reversed"
            ))),
            _ => Ok(SubdeptFilter::All),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(subdept: Option<i64>, lo: Option<i64>, hi: Option<i64>) -> RangeArgs {
        RangeArgs {
            start: "2024-07-01".to_string(),
            end: "2024-07-31".to_string(),
            subdept,
            subdept_start: lo,
            subdept_end: hi,
            upc: Vec::new(),
        }
    }

    #[test]
    fn test_subdept_filter() {
        assert_eq!(args(None, None, None).subdept_filter().unwrap(), SubdeptFilter::All);
        assert_eq!(args(Some(4), None, None).subdept_filter().unwrap(), SubdeptFilter::One(4));
        assert_eq!(args(None, Some(2), Some(5)).subdept_filter().unwrap(), SubdeptFilter::Range(2, 5));
        assert!(args(None, Some(5), Some(2)).subdept_filter().is_err());
    }

    #[test]
    fn test_cli_parses_range_flags() {
        let cli = Cli::try_parse_from([
            "tillroll", "range", "--start", "2024-07-01", "--end", "2024-07-31",
            "--subdept-start", "1", "--subdept-end", "3", "--upc", "4000", "--upc", "4001",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Range { filter }) => {
                assert_eq!(filter.subdept_filter().unwrap(), SubdeptFilter::Range(1, 3));
                assert_eq!(filter.upc, vec!["4000", "4001"]);
            }
            _ => panic!("expected range command"),
        }
    }

    #[test]
    fn test_cli_rejects_wait_without_async() {
        assert!(Cli::try_parse_from(["tillroll", "upload", "a.csv", "--wait"]).is_err());
        assert!(Cli::try_parse_from(["tillroll", "upload", "a.csv", "--async", "--wait"]).is_ok());
    }
}
