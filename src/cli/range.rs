use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{open_db, RangeArgs};
use crate::error::Result;
use crate::fmt::{amount, grouped};
use crate::reports::range_aggregate;
use crate::settings::load_settings;

pub fn run(args: &RangeArgs) -> Result<()> {
    let range = args.date_range()?;
    let filter = args.subdept_filter()?;
    let conn = open_db(&load_settings())?;
    let rows = range_aggregate(&conn, &range, filter, &args.upc)?;

    let mut table = Table::new();
    table.set_header(vec!["Item Code", "Brand", "Description", "Subdept", "Vendor", "Units", "Amount"]);
    let (mut units, mut total) = (0.0, 0.0);
    for r in &rows {
        units += r.units_sum;
        total += r.amount_sum;
        table.add_row(vec![
            Cell::new(&r.item_code),
            Cell::new(&r.item_brand),
            Cell::new(&r.item_pos_desc),
            Cell::new(format!("{} {}", r.subdept_no, r.subdept_desc)),
            Cell::new(&r.vendor_name),
            Cell::new(grouped(r.units_sum, 2)).set_alignment(CellAlignment::Right),
            Cell::new(amount(r.amount_sum)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL"),
        Cell::new(""),
        Cell::new(format!("{} item(s)", rows.len())),
        Cell::new(""),
        Cell::new(""),
        Cell::new(grouped(units, 2)).set_alignment(CellAlignment::Right),
        Cell::new(amount(total)).set_alignment(CellAlignment::Right),
    ]);

    println!("Item movement {} to {}\n{table}", range.start, range.end);
    Ok(())
}
