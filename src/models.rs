use std::collections::HashMap;

use serde::Serialize;

use crate::headers::{is_numeric, REQUIRED_HEADERS};

/// A raw row keyed by canonical header, every value still text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRow {
    values: HashMap<&'static str, String>,
}

impl CanonicalRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &'static str, value: String) {
        self.values.insert(field, value);
    }

    /// Fill every missing canonical field: `"0"` for numeric columns, empty text otherwise.
    pub fn fill_defaults(mut self) -> Self {
        for field in REQUIRED_HEADERS {
            self.values.entry(field).or_insert_with(|| {
                if is_numeric(field) {
                    "0".to_string()
                } else {
                    String::new()
                }
            });
        }
        self
    }

    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }
}

/// One fact row of `raw_transactions`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date_iso: String,
    pub item_code: String,
    pub item_brand: String,
    pub item_pos_desc: String,
    pub subdept_no: i64,
    pub subdept_desc: String,
    pub category_no: i64,
    pub category_desc: String,
    pub vendor_id: String,
    pub vendor_name: String,
    pub units_sum: f64,
    pub amount_sum: f64,
    pub weight_volume_sum: f64,
    pub bl_profit: f64,
    pub bl_margin: f64,
    pub bl_rank: f64,
    pub bl_ratio: f64,
    pub prop_rank: f64,
    pub prop_ratio: f64,
    pub source_filename: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subdepartment {
    pub subdept_no: i64,
    pub subdept_desc: String,
}

/// One `upload_meta` audit row.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub id: i64,
    pub file_name: String,
    pub uploaded_at: String,
    pub rows_parsed: i64,
    pub inserted: i64,
    pub ignored: i64,
}

/// Result payload of one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub file_name: String,
    pub rows_parsed: usize,
    pub inserted: usize,
    pub ignored: usize,
    pub sample_dates: Vec<String>,
    pub elapsed_ms: u64,
}
