use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Canonical header contract
// ---------------------------------------------------------------------------

pub const DATE: &str = "Date";
pub const ITEM_CODE: &str = "Item-Code";
pub const ITEM_BRAND: &str = "Item-Brand";
pub const ITEM_POS_DESC: &str = "Item-POS description";
pub const SUBDEPT_NO: &str = "Sub-department-Number";
pub const SUBDEPT_DESC: &str = "Sub-department-Description";
pub const CATEGORY_NO: &str = "Category-Number";
pub const CATEGORY_DESC: &str = "Category-Description";
pub const VENDOR_ID: &str = "Vendor-ID";
pub const VENDOR_NAME: &str = "Vendor-Name";
pub const UNITS_SUM: &str = "Units-Sum";
pub const AMOUNT_SUM: &str = "Amount-Sum";
pub const WEIGHT_VOLUME_SUM: &str = "Weight/Volume-Sum";
pub const BL_PROFIT: &str = "Bottom line-Profit";
pub const BL_MARGIN: &str = "Bottom line-Margin";
pub const BL_RANK: &str = "Bottom line-Rank";
pub const BL_RATIO: &str = "Bottom line-Ratio";
pub const PROP_RANK: &str = "Proportion-Rank";
pub const PROP_RATIO: &str = "Proportion-Ratio";

pub const REQUIRED_HEADERS: [&str; 19] = [
    DATE,
    ITEM_CODE,
    ITEM_BRAND,
    ITEM_POS_DESC,
    SUBDEPT_NO,
    SUBDEPT_DESC,
    CATEGORY_NO,
    CATEGORY_DESC,
    VENDOR_ID,
    VENDOR_NAME,
    UNITS_SUM,
    AMOUNT_SUM,
    WEIGHT_VOLUME_SUM,
    BL_PROFIT,
    BL_MARGIN,
    BL_RANK,
    BL_RATIO,
    PROP_RANK,
    PROP_RATIO,
];

/// Columns that must resolve for a file to be accepted at all.
pub const MIN_HEADERS: [&str; 8] = [
    DATE,
    ITEM_CODE,
    ITEM_POS_DESC,
    SUBDEPT_NO,
    SUBDEPT_DESC,
    UNITS_SUM,
    AMOUNT_SUM,
    WEIGHT_VOLUME_SUM,
];

pub const NUMERIC_HEADERS: [&str; 11] = [
    UNITS_SUM,
    AMOUNT_SUM,
    WEIGHT_VOLUME_SUM,
    BL_PROFIT,
    BL_MARGIN,
    BL_RANK,
    BL_RATIO,
    PROP_RANK,
    PROP_RATIO,
    CATEGORY_NO,
    SUBDEPT_NO,
];

/// Alternate export names. `None` marks a column that is known and deliberately dropped.
pub const SYNONYMS: &[(&str, Option<&str>)] = &[
    ("main code", Some(ITEM_CODE)),
    ("pos description", Some(ITEM_POS_DESC)),
    ("totalizer-number", Some(SUBDEPT_NO)),
    ("totalizer-description", Some(SUBDEPT_DESC)),
    ("quantity", Some(UNITS_SUM)),
    ("amount", Some(AMOUNT_SUM)),
    ("weight/volume", Some(WEIGHT_VOLUME_SUM)),
    ("category-number", Some(CATEGORY_NO)),
    ("category-description", Some(CATEGORY_DESC)),
    ("vendor-id", Some(VENDOR_ID)),
    ("vendor-name", Some(VENDOR_NAME)),
    ("transaction-number", None),
    ("operator validated", None),
];

pub fn is_numeric(canonical: &str) -> bool {
    NUMERIC_HEADERS.contains(&canonical)
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

fn is_dash_variant(c: char) -> bool {
    matches!(
        c,
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}'
    )
}

fn strip_wrapping_quotes(s: &str) -> &str {
    for (open, close) in [('"', '"'), ('\'', '\''), ('\u{201C}', '\u{201D}'), ('\u{2018}', '\u{2019}')] {
        if s.chars().count() >= 2 && s.starts_with(open) && s.ends_with(close) {
            let inner = &s[open.len_utf8()..s.len() - close.len_utf8()];
            return inner.trim();
        }
    }
    s
}

/// Reduce raw header text to its lookup key.
pub fn normalize_header(raw: &str) -> String {
    let s = raw.trim().trim_start_matches('\u{FEFF}').trim();
    let s = strip_wrapping_quotes(s).trim_matches('"').trim();

    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars() {
        let c = if c == '\u{00A0}' {
            ' '
        } else if is_dash_variant(c) {
            '-'
        } else {
            c
        };
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if !(c.is_alphanumeric() || matches!(c, '-' | '/' | '.')) {
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.extend(c.to_lowercase());
    }
    out
}

fn lookup_table() -> &'static HashMap<String, Option<&'static str>> {
    static TABLE: OnceLock<HashMap<String, Option<&'static str>>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut map = HashMap::new();
        for (alt, canon) in SYNONYMS {
            map.insert(normalize_header(alt), *canon);
        }
        // Exact canonical names take precedence over any synonym with the same key.
        for req in REQUIRED_HEADERS {
            map.insert(normalize_header(req), Some(req));
        }
        map
    })
}

/// Resolve a raw header to its canonical field, or `None` when the column is dropped.
pub fn canonical_for(raw: &str) -> Option<&'static str> {
    lookup_table().get(&normalize_header(raw)).copied().flatten()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCheck {
    pub ok: bool,
    /// Relative to the full 19-column contract, reported even when `ok`.
    pub missing: Vec<&'static str>,
}

pub fn validate_headers<'a, I>(raw_headers: I) -> HeaderCheck
where
    I: IntoIterator<Item = &'a str>,
{
    let present: HashSet<&'static str> = raw_headers.into_iter().filter_map(canonical_for).collect();
    let missing: Vec<&'static str> = REQUIRED_HEADERS
        .iter()
        .copied()
        .filter(|h| !present.contains(h))
        .collect();
    let ok = MIN_HEADERS.iter().all(|h| present.contains(h));
    HeaderCheck { ok, missing }
}
