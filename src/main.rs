mod canonical;
mod cli;
mod coerce;
mod db;
mod error;
mod fmt;
mod headers;
mod ingest;
mod jobs;
mod models;
mod parser;
mod reports;
mod settings;
mod upload;
mod worker;

use std::sync::OnceLock;

use clap::Parser;
use log::LevelFilter;

use cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if std::env::var("RUST_LOG").is_err() {
            builder.filter_module("tillroll", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        None | Some(Commands::Status) => cli::status::run(),
        Some(Commands::Init { data_dir }) => cli::init::run(data_dir),
        Some(Commands::Upload {
            file,
            queue,
            wait,
            timeout_secs,
        }) => cli::upload::run(&file, queue, wait, timeout_secs),
        Some(Commands::Worker { once, threads }) => cli::worker::run(once, threads),
        Some(Commands::Job { id }) => cli::job::run(&id),
        Some(Commands::Subdepartments) => cli::subdepartments::list(),
        Some(Commands::Range { filter }) => cli::range::run(&filter),
        Some(Commands::Export { filter, output }) => cli::export::run(&filter, output),
        Some(Commands::Optimize) => cli::status::optimize_db(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
