use std::io::Write;

use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;

use crate::coerce::pad13;
use crate::error::{Result, TillrollError};
use crate::models::Subdepartment;

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SubdeptFilter {
    #[default]
    All,
    One(i64),
    Range(i64, i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

fn is_iso_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter().enumerate().all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}

impl DateRange {
    pub fn new(start: &str, end: &str) -> Result<Self> {
        let (start, end) = (start.trim(), end.trim());
        if !is_iso_date(start) || !is_iso_date(end) {
            return Err(TillrollError::InvalidDateRange(
                "start and end are required in YYYY-MM-DD".to_string(),
            ));
        }
        Ok(Self {
            start: start.to_string(),
            end: end.to_string(),
        })
    }

    /// `item_movement_<start>_<end>.csv` with the dashes dropped.
    pub fn export_filename(&self) -> String {
        format!(
            "item_movement_{}_{}.csv",
            self.start.replace('-', ""),
            self.end.replace('-', "")
        )
    }
}

// ---------------------------------------------------------------------------
// Subdepartments
// ---------------------------------------------------------------------------

pub fn list_subdepartments(conn: &Connection) -> Result<Vec<Subdepartment>> {
    let mut stmt = conn.prepare("SELECT subdept_no, subdept_desc FROM subdepartments ORDER BY subdept_no ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Subdepartment {
            subdept_no: row.get(0)?,
            subdept_desc: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn subdepartment_label(s: &Subdepartment) -> String {
    format!("{} - {}", s.subdept_no, s.subdept_desc)
}

// ---------------------------------------------------------------------------
// Range aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemMovement {
    #[serde(rename = "Item-Code")]
    pub item_code: String,
    #[serde(rename = "Item-Brand")]
    pub item_brand: String,
    #[serde(rename = "Item-POS description")]
    pub item_pos_desc: String,
    #[serde(rename = "Sub-department-Number")]
    pub subdept_no: i64,
    #[serde(rename = "Sub-department-Description")]
    pub subdept_desc: String,
    #[serde(rename = "Category-Number")]
    pub category_no: i64,
    #[serde(rename = "Category-Description")]
    pub category_desc: String,
    #[serde(rename = "Vendor-ID")]
    pub vendor_id: String,
    #[serde(rename = "Vendor-Name")]
    pub vendor_name: String,
    #[serde(rename = "Units-Sum")]
    pub units_sum: f64,
    #[serde(rename = "Amount-Sum")]
    pub amount_sum: f64,
}

/// One row per item code over the window, ordered by amount descending.
/// `item_codes`, when non-empty, restricts the result to those codes.
pub fn range_aggregate(
    conn: &Connection,
    range: &DateRange,
    subdept: SubdeptFilter,
    item_codes: &[String],
) -> Result<Vec<ItemMovement>> {
    let mut clauses = vec!["date_iso BETWEEN ?1 AND ?2".to_string()];
    let mut params: Vec<Value> = vec![Value::from(range.start.clone()), Value::from(range.end.clone())];

    match subdept {
        SubdeptFilter::All => {}
        SubdeptFilter::One(no) => {
            params.push(Value::from(no));
            clauses.push(format!("subdept_no = ?{}", params.len()));
        }
        SubdeptFilter::Range(lo, hi) => {
            params.push(Value::from(lo));
            params.push(Value::from(hi));
            clauses.push(format!("subdept_no BETWEEN ?{} AND ?{}", params.len() - 1, params.len()));
        }
    }

    if !item_codes.is_empty() {
        let mut placeholders = Vec::with_capacity(item_codes.len());
        for code in item_codes {
            params.push(Value::from(pad13(code)));
            placeholders.push(format!("?{}", params.len()));
        }
        clauses.push(format!("item_code IN ({})", placeholders.join(", ")));
    }

    let sql = format!(
        "SELECT item_code, MAX(item_brand), MAX(item_pos_desc), MAX(subdept_no), MAX(subdept_desc), \
                MAX(category_no), MAX(category_desc), MAX(vendor_id), MAX(vendor_name), \
                ROUND(SUM(units_sum), 6) AS units, ROUND(SUM(amount_sum), 2) AS amount \
         FROM raw_transactions WHERE {} \
         GROUP BY item_code ORDER BY amount DESC",
        clauses.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
        Ok(ItemMovement {
            item_code: row.get(0)?,
            item_brand: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            item_pos_desc: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            subdept_no: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
            subdept_desc: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            category_no: row.get::<_, Option<i64>>(5)?.unwrap_or_default(),
            category_desc: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            vendor_id: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            vendor_name: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            units_sum: row.get(9)?,
            amount_sum: row.get(10)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write the aggregate as CSV with canonical header names.
pub fn export_csv<W: Write>(rows: &[ItemMovement], out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for row in rows {
        wtr.serialize(row)?;
    }
    if rows.is_empty() {
        wtr.write_record([
            "Item-Code",
            "Item-Brand",
            "Item-POS description",
            "Sub-department-Number",
            "Sub-department-Description",
            "Category-Number",
            "Category-Description",
            "Vendor-ID",
            "Vendor-Name",
            "Units-Sum",
            "Amount-Sum",
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
