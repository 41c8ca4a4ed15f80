use std::path::Path;

use log::debug;

use crate::error::{Result, TillrollError};
use crate::headers::{canonical_for, validate_headers, REQUIRED_HEADERS};
use crate::models::CanonicalRow;

/// Output of either file parser.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub rows: Vec<CanonicalRow>,
    /// Canonical headers absent from the file, relative to the full contract.
    pub missing: Vec<&'static str>,
    /// False when the file had no data rows or lacked a minimum header.
    pub accepted: bool,
}

impl ParsedFile {
    fn empty() -> Self {
        Self {
            rows: Vec::new(),
            missing: REQUIRED_HEADERS.to_vec(),
            accepted: false,
        }
    }

    fn rejected(missing: Vec<&'static str>) -> Self {
        Self {
            rows: Vec::new(),
            missing,
            accepted: false,
        }
    }
}

// ---------------------------------------------------------------------------
// File kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileKind {
    Csv,
    Workbook,
}

const ALL_KINDS: &[FileKind] = &[FileKind::Csv, FileKind::Workbook];

impl FileKind {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Csv => &["csv"],
            Self::Workbook => &["xlsb", "xlsx", "xls"],
        }
    }

    /// Pick the parser from the name the file was uploaded under.
    pub fn from_name(original_name: &str) -> Result<Self> {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        ALL_KINDS
            .iter()
            .find(|k| k.extensions().contains(&ext.as_str()))
            .copied()
            .ok_or_else(|| TillrollError::UnsupportedFileType(original_name.to_string()))
    }

    pub fn parse(&self, file_path: &Path) -> Result<ParsedFile> {
        match self {
            Self::Csv => parse_csv(file_path),
            Self::Workbook => parse_workbook(file_path),
        }
    }
}

pub fn parse_uploaded_file(file_path: &Path, original_name: &str) -> Result<ParsedFile> {
    let kind = FileKind::from_name(original_name)?;
    debug!("Parsing {} as {:?}", file_path.display(), kind);
    kind.parse(file_path)
}

// ---------------------------------------------------------------------------
// Shared post-processing
// ---------------------------------------------------------------------------

/// Map raw columns onto canonical fields; unknown columns fall away.
fn remap_row<'a, I>(headers: &[String], values: I) -> CanonicalRow
where
    I: IntoIterator<Item = &'a str>,
{
    let mut row = CanonicalRow::new();
    for (header, value) in headers.iter().zip(values) {
        if let Some(canon) = canonical_for(header) {
            row.insert(canon, value.to_string());
        }
    }
    row.fill_defaults()
}

/// Consume raw rows, validating headers once the first data row shows up.
fn collect_rows<I>(headers: &[String], raw_rows: I) -> Result<ParsedFile>
where
    I: Iterator<Item = Result<Vec<String>>>,
{
    let mut raw_rows = raw_rows.peekable();
    if raw_rows.peek().is_none() {
        return Ok(ParsedFile::empty());
    }
    let check = validate_headers(headers.iter().map(String::as_str));
    if !check.ok {
        return Ok(ParsedFile::rejected(check.missing));
    }
    let mut rows = Vec::new();
    for raw in raw_rows {
        let raw = raw?;
        rows.push(remap_row(headers, raw.iter().map(String::as_str)));
    }
    Ok(ParsedFile {
        rows,
        missing: check.missing,
        accepted: true,
    })
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

fn parse_csv(file_path: &Path) -> Result<ParsedFile> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(std::io::BufReader::new(file));

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{FEFF}').to_string())
        .collect();

    let records = rdr.into_records().filter_map(|result| match result {
        Ok(record) if record.iter().all(|f| f.is_empty()) => None,
        Ok(record) => Some(Ok(record.iter().map(str::to_string).collect())),
        Err(e) => Some(Err(TillrollError::from(e))),
    });
    collect_rows(&headers, records)
}

// ---------------------------------------------------------------------------
// Spreadsheet workbook (feature-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsb")]
fn cell_text(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        // Serial number text; the date coercer reads it back as an Excel serial.
        Data::DateTime(dt) => dt.as_f64().to_string(),
        _ => String::new(),
    }
}

#[cfg(feature = "xlsb")]
fn parse_workbook(file_path: &Path) -> Result<ParsedFile> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| TillrollError::Parse(format!("Failed to open workbook: {e}")))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| TillrollError::Parse(format!("Failed to read first sheet: {e}")))?,
        None => return Ok(ParsedFile::empty()),
    };

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(ParsedFile::empty());
    };
    let headers: Vec<String> = header_row.iter().map(cell_text).collect();

    let records = sheet_rows.filter_map(|cells| {
        let values: Vec<String> = cells.iter().map(cell_text).collect();
        if values.iter().all(|v| v.trim().is_empty()) {
            None
        } else {
            Some(Ok(values))
        }
    });
    collect_rows(&headers, records)
}

#[cfg(not(feature = "xlsb"))]
fn parse_workbook(file_path: &Path) -> Result<ParsedFile> {
    Err(TillrollError::UnsupportedFileType(format!(
        "{} (built without workbook support)",
        file_path.display()
    )))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::headers::*;

    pub(crate) const FULL_HEADER: &str = "Date,Item-Code,Item-Brand,Item-POS description,Sub-department-Number,Sub-department-Description,Category-Number,Category-Description,Vendor-ID,Vendor-Name,Units-Sum,Amount-Sum,Weight/Volume-Sum,Bottom line-Profit,Bottom line-Margin,Bottom line-Rank,Bottom line-Ratio,Proportion-Rank,Proportion-Ratio";

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_file_kind_from_name() {
        assert_eq!(FileKind::from_name("sales.CSV").unwrap(), FileKind::Csv);
        assert_eq!(FileKind::from_name("week 32.xlsb").unwrap(), FileKind::Workbook);
        assert!(matches!(
            FileKind::from_name("notes.txt"),
            Err(TillrollError::UnsupportedFileType(_))
        ));
        assert!(FileKind::from_name("no_extension").is_err());
    }

    #[test]
    fn test_parse_csv_full_header() {
        let dir = tempfile::tempdir().unwrap();
        let content = format!(
            "{FULL_HEADER}\n07/05/2024,4011,Dole,BANANAS,12,PRODUCE,3,FRUIT,V1,Dole Inc,3,\"1,234.50\",0,1,2,3,4,5,6\n"
        );
        let path = write(dir.path(), "a.csv", &content);
        let parsed = parse_uploaded_file(&path, "a.csv").unwrap();
        assert!(parsed.accepted);
        assert!(parsed.missing.is_empty());
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].get(AMOUNT_SUM), "1,234.50");
        assert_eq!(parsed.rows[0].get(VENDOR_NAME), "Dole Inc");
    }

    #[test]
    fn test_parse_csv_bom_blank_lines_and_trim() {
        let dir = tempfile::tempdir().unwrap();
        let content = "\u{FEFF}Date,Item-Code,Item-POS description,Sub-department-Number,Sub-department-Description,Units-Sum,Amount-Sum,Weight/Volume-Sum,Store\n\
                       \n\
                       2024-07-05 , 4011 ,  BANANAS , 12 , PRODUCE , 3 , 1.50 , 0 , North\n\
                       \n";
        let path = write(dir.path(), "a.csv", content);
        let parsed = parse_uploaded_file(&path, "a.csv").unwrap();
        assert!(parsed.accepted);
        assert_eq!(parsed.rows.len(), 1);
        let row = &parsed.rows[0];
        assert_eq!(row.get(DATE), "2024-07-05");
        assert_eq!(row.get(ITEM_POS_DESC), "BANANAS");
        // Missing canonical columns are defaulted, unknown ones dropped.
        assert_eq!(row.get(BL_PROFIT), "0");
        assert_eq!(row.get(VENDOR_ID), "");
        assert_eq!(row.get("Store"), "");
        assert_eq!(parsed.missing.len(), 11);
    }

    #[test]
    fn test_parse_csv_missing_min_header() {
        let dir = tempfile::tempdir().unwrap();
        let content = "Date,Item-Code,Units-Sum\n2024-07-05,4011,3\n";
        let path = write(dir.path(), "a.csv", content);
        let parsed = parse_uploaded_file(&path, "a.csv").unwrap();
        assert!(!parsed.accepted);
        assert!(parsed.rows.is_empty());
        assert!(parsed.missing.contains(&ITEM_POS_DESC));
    }

    #[test]
    fn test_parse_csv_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.csv", &format!("{FULL_HEADER}\n"));
        let parsed = parse_uploaded_file(&path, "a.csv").unwrap();
        assert!(!parsed.accepted);
        assert_eq!(parsed.missing.len(), REQUIRED_HEADERS.len());
    }

    #[test]
    fn test_parse_csv_ragged_row_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let content = format!("{FULL_HEADER}\n2024-07-05,4011\n");
        let path = write(dir.path(), "a.csv", &content);
        assert!(matches!(
            parse_uploaded_file(&path, "a.csv"),
            Err(TillrollError::Csv(_))
        ));
    }

    #[cfg(feature = "xlsb")]
    #[test]
    fn test_cell_text() {
        use calamine::Data;
        assert_eq!(cell_text(&Data::Float(12.0)), "12");
        assert_eq!(cell_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_text(&Data::Float(4011000000000.0)), "4011000000000");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("PRODUCE".to_string())), "PRODUCE");
    }

    #[cfg(feature = "xlsb")]
    #[test]
    fn test_parse_workbook_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.xlsb", "definitely not a workbook");
        assert!(matches!(
            parse_uploaded_file(&path, "a.xlsb"),
            Err(TillrollError::Parse(_))
        ));
    }

    #[cfg(feature = "xlsb")]
    pub(crate) fn fixture(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
    }

    #[cfg(feature = "xlsb")]
    #[test]
    fn test_parse_workbook_reads_cells() {
        let parsed = parse_uploaded_file(&fixture("item_movement.xlsx"), "item_movement.xlsx").unwrap();
        assert!(parsed.accepted);
        assert!(parsed.missing.is_empty());
        // The empty third sheet row is dropped.
        assert_eq!(parsed.rows.len(), 3);

        let first = &parsed.rows[0];
        assert_eq!(first.get(DATE), "45478");
        assert_eq!(first.get(ITEM_CODE), "4011");
        assert_eq!(first.get(SUBDEPT_DESC), "PRODUCE");
        assert_eq!(first.get(AMOUNT_SUM), "1234.5");

        assert_eq!(parsed.rows[1].get(DATE), "45479.5");
        assert_eq!(parsed.rows[1].get(ITEM_CODE), "12345678905");
        assert_eq!(parsed.rows[2].get(DATE), "07/07/2024");
    }

    #[cfg(feature = "xlsb")]
    #[test]
    fn test_parse_workbook_header_only_sheet() {
        let parsed = parse_uploaded_file(&fixture("header_only.xlsx"), "header_only.xlsx").unwrap();
        assert!(!parsed.accepted);
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.missing.len(), REQUIRED_HEADERS.len());
    }
}
