use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::reports::{list_subdepartments, subdepartment_label};
use crate::settings::load_settings;

pub fn list() -> Result<()> {
    let conn = open_db(&load_settings())?;
    let subs = list_subdepartments(&conn)?;
    if subs.is_empty() {
        println!("No subdepartments yet. Upload an export first.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["No", "Description", "Label"]);
    for s in &subs {
        table.add_row(vec![
            Cell::new(s.subdept_no),
            Cell::new(&s.subdept_desc),
            Cell::new(subdepartment_label(s)),
        ]);
    }
    println!("Subdepartments\n{table}");
    Ok(())
}
