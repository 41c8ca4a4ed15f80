use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::coerce::{int_or_zero, number_or_zero, pad13, parse_date_to_iso};
use crate::headers::*;
use crate::models::{CanonicalRow, Transaction};

/// Field order here is the hash contract; reordering changes every digest.
#[derive(Serialize)]
struct CanonicalForm<'a> {
    #[serde(rename = "Date")]
    date: &'a str,
    #[serde(rename = "Item-Code")]
    item_code: &'a str,
    #[serde(rename = "Item-Brand")]
    item_brand: &'a str,
    #[serde(rename = "Item-POS description")]
    item_pos_desc: &'a str,
    #[serde(rename = "Sub-department-Number")]
    subdept_no: String,
    #[serde(rename = "Sub-department-Description")]
    subdept_desc: &'a str,
    #[serde(rename = "Category-Number")]
    category_no: String,
    #[serde(rename = "Category-Description")]
    category_desc: &'a str,
    #[serde(rename = "Vendor-ID")]
    vendor_id: &'a str,
    #[serde(rename = "Vendor-Name")]
    vendor_name: &'a str,
    #[serde(rename = "Units-Sum")]
    units_sum: String,
    #[serde(rename = "Amount-Sum")]
    amount_sum: String,
    #[serde(rename = "Weight/Volume-Sum")]
    weight_volume_sum: String,
    #[serde(rename = "Bottom line-Profit")]
    bl_profit: String,
    #[serde(rename = "Bottom line-Margin")]
    bl_margin: String,
    #[serde(rename = "Bottom line-Rank")]
    bl_rank: String,
    #[serde(rename = "Bottom line-Ratio")]
    bl_ratio: String,
    #[serde(rename = "Proportion-Rank")]
    prop_rank: String,
    #[serde(rename = "Proportion-Ratio")]
    prop_ratio: String,
}

/// Six fraction digits; negative zero prints as zero.
fn fixed6(value: f64) -> String {
    format!("{:.6}", value + 0.0)
}

/// Stable JSON text over the business fields. Source file and hash are excluded.
pub fn canonical_json(t: &Transaction) -> String {
    let form = CanonicalForm {
        date: &t.date_iso,
        item_code: &t.item_code,
        item_brand: t.item_brand.trim(),
        item_pos_desc: t.item_pos_desc.trim(),
        subdept_no: t.subdept_no.to_string(),
        subdept_desc: t.subdept_desc.trim(),
        category_no: t.category_no.to_string(),
        category_desc: t.category_desc.trim(),
        vendor_id: t.vendor_id.trim(),
        vendor_name: t.vendor_name.trim(),
        units_sum: fixed6(t.units_sum),
        amount_sum: fixed6(t.amount_sum),
        weight_volume_sum: fixed6(t.weight_volume_sum),
        bl_profit: fixed6(t.bl_profit),
        bl_margin: fixed6(t.bl_margin),
        bl_rank: fixed6(t.bl_rank),
        bl_ratio: fixed6(t.bl_ratio),
        prop_rank: fixed6(t.prop_rank),
        prop_ratio: fixed6(t.prop_ratio),
    };
    // A struct of strings cannot fail to serialise.
    serde_json::to_string(&form).unwrap_or_default()
}

pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Coerce a canonical row into a fact row with its content hash.
/// Returns `None` when the date cannot be read; such rows are skipped.
pub fn build_transaction(row: &CanonicalRow, source_filename: &str) -> Option<Transaction> {
    let date_iso = parse_date_to_iso(row.get(DATE))?;
    let text = |field: &str| row.get(field).trim().to_string();
    let mut t = Transaction {
        date_iso,
        item_code: pad13(row.get(ITEM_CODE)),
        item_brand: text(ITEM_BRAND),
        item_pos_desc: text(ITEM_POS_DESC),
        subdept_no: int_or_zero(row.get(SUBDEPT_NO)),
        subdept_desc: text(SUBDEPT_DESC),
        category_no: int_or_zero(row.get(CATEGORY_NO)),
        category_desc: text(CATEGORY_DESC),
        vendor_id: text(VENDOR_ID),
        vendor_name: text(VENDOR_NAME),
        units_sum: number_or_zero(row.get(UNITS_SUM)),
        amount_sum: number_or_zero(row.get(AMOUNT_SUM)),
        weight_volume_sum: number_or_zero(row.get(WEIGHT_VOLUME_SUM)),
        bl_profit: number_or_zero(row.get(BL_PROFIT)),
        bl_margin: number_or_zero(row.get(BL_MARGIN)),
        bl_rank: number_or_zero(row.get(BL_RANK)),
        bl_ratio: number_or_zero(row.get(BL_RATIO)),
        prop_rank: number_or_zero(row.get(PROP_RANK)),
        prop_ratio: number_or_zero(row.get(PROP_RATIO)),
        source_filename: source_filename.to_string(),
        content_hash: String::new(),
    };
    t.content_hash = sha256_hex(&canonical_json(&t));
    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> CanonicalRow {
        let mut row = CanonicalRow::new();
        row.insert(DATE, "07/05/2024".to_string());
        row.insert(ITEM_CODE, "4011".to_string());
        row.insert(ITEM_POS_DESC, " BANANAS ".to_string());
        row.insert(SUBDEPT_NO, "12".to_string());
        row.insert(SUBDEPT_DESC, "PRODUCE".to_string());
        row.insert(UNITS_SUM, "3".to_string());
        row.insert(AMOUNT_SUM, "1,234.50".to_string());
        row.insert(WEIGHT_VOLUME_SUM, "".to_string());
        row.fill_defaults()
    }

    #[test]
    fn test_canonical_json_layout() {
        let t = build_transaction(&sample_row(), "a.csv").unwrap();
        let json = canonical_json(&t);
        assert!(json.starts_with(r#"{"Date":"2024-07-05","Item-Code":"0000000004011","Item-Brand":"""#));
        assert!(json.contains(r#""Item-POS description":"BANANAS""#));
        assert!(json.contains(r#""Sub-department-Number":"12""#));
        assert!(json.contains(r#""Amount-Sum":"1234.500000""#));
        assert!(json.ends_with(r#""Proportion-Ratio":"0.000000"}"#));
        assert!(!json.contains("a.csv"));
    }

    #[test]
    fn test_hash_ignores_source_file() {
        let a = build_transaction(&sample_row(), "monday.csv").unwrap();
        let b = build_transaction(&sample_row(), "tuesday.xlsb").unwrap();
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn test_hash_equal_for_equivalent_formatting() {
        let mut other = sample_row();
        other.insert(DATE, "2024-07-05".to_string());
        other.insert(ITEM_CODE, "0000000004011".to_string());
        other.insert(AMOUNT_SUM, "1234.5".to_string());
        other.insert(ITEM_POS_DESC, "BANANAS".to_string());
        let a = build_transaction(&sample_row(), "a.csv").unwrap();
        let b = build_transaction(&other, "a.csv").unwrap();
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_hash_changes_with_business_fields() {
        let mut other = sample_row();
        other.insert(UNITS_SUM, "4".to_string());
        let a = build_transaction(&sample_row(), "a.csv").unwrap();
        let b = build_transaction(&other, "a.csv").unwrap();
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_negative_zero_formats_as_zero() {
        assert_eq!(fixed6(-0.0), "0.000000");
        assert_eq!(fixed6(-12.34), "-12.340000");
    }

    #[test]
    fn test_unparseable_date_skips_row() {
        let mut row = sample_row();
        row.insert(DATE, "not a date".to_string());
        assert!(build_transaction(&row, "a.csv").is_none());
    }

    #[test]
    fn test_integer_columns_use_tolerant_numbers() {
        let mut row = sample_row();
        row.insert(SUBDEPT_NO, "1,234".to_string());
        row.insert(CATEGORY_NO, "(7)".to_string());
        let t = build_transaction(&row, "a.csv").unwrap();
        assert_eq!(t.subdept_no, 1234);
        assert_eq!(t.category_no, -7);

        let mut plain = sample_row();
        plain.insert(SUBDEPT_NO, "1234".to_string());
        plain.insert(CATEGORY_NO, "-7".to_string());
        assert_eq!(build_transaction(&plain, "b.csv").unwrap().content_hash, t.content_hash);
    }
}
