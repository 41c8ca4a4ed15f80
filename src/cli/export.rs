use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use crate::cli::{open_db, RangeArgs};
use crate::error::Result;
use crate::reports::{export_csv, range_aggregate};
use crate::settings::load_settings;

pub fn run(args: &RangeArgs, output: Option<String>) -> Result<()> {
    let range = args.date_range()?;
    let filter = args.subdept_filter()?;
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let rows = range_aggregate(&conn, &range, filter, &args.upc)?;

    let path = match output {
        Some(p) => PathBuf::from(p),
        None => {
            let dir = settings.exports_dir();
            std::fs::create_dir_all(&dir)?;
            dir.join(range.export_filename())
        }
    };
    export_csv(&rows, BufWriter::new(File::create(&path)?))?;
    println!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(())
}
