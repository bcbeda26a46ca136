//! Source reader for the flat funding export.
//!
//! The export is a delimited file with a header row. Headers are
//! canonicalized (`Startup Name` -> `startup_name`, `Amount in USD:` ->
//! `amount_usd`) and cells are decoded as Latin-1 so arbitrary bytes never
//! abort a run. Dates that fail to parse become absent values; amounts that
//! fail to parse are kept as their raw text so the normalizer can decide.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ByteRecord, ReaderBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// Canonical columns the normalizer cannot run without.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "startup_name",
    "industry",
    "city",
    "investors",
    "date",
    "round_type",
    "amount_usd",
];

const HEADER_ALIASES: &[(&str, &str)] = &[("amount_in_usd", "amount_usd"), ("s_no", "temp_id")];

// Cell values treated as missing, matching common spreadsheet/CSV exports.
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A present amount cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    Usd(i64),
    /// Not a number, e.g. `undisclosed`.
    Unparsed(String),
}

impl Amount {
    pub fn usd(&self) -> Option<i64> {
        match self {
            Amount::Usd(value) => Some(*value),
            Amount::Unparsed(_) => None,
        }
    }
}

/// One row of the export after canonicalization and type coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    /// 1-based line in the source file (header is line 1).
    pub line: u64,
    pub temp_id: Option<String>,
    pub startup_name: Option<String>,
    pub city: Option<String>,
    pub industry: Option<String>,
    pub investors: Option<String>,
    pub date: Option<NaiveDate>,
    pub round_type: Option<String>,
    pub amount_usd: Option<Amount>,
}

/// The whole export held in memory.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    /// Canonical column names in file order.
    pub columns: Vec<String>,
    pub records: Vec<SourceRecord>,
    /// Present date cells that could not be parsed.
    pub invalid_dates: usize,
    /// Present amount cells that could not be parsed.
    pub invalid_amounts: usize,
}

impl SourceTable {
    /// Builds a table from already-typed records, e.g. for tests or
    /// callers that obtained rows from somewhere other than a file.
    pub fn from_records(records: Vec<SourceRecord>) -> Self {
        Self {
            columns: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            records,
            invalid_dates: 0,
            invalid_amounts: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Lowercase, spaces to underscores, colons removed, then aliases applied.
pub fn canonicalize_header(raw: &str) -> String {
    let canonical = raw.trim().to_lowercase().replace(' ', "_").replace(':', "");
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == canonical)
        .map(|(_, name)| name.to_string())
        .unwrap_or(canonical)
}

/// Parses a date cell; anything unrecognised is `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}

/// Parses an amount cell such as `50000000`, `1,30,00,000` or `2.5e6`.
pub fn parse_amount(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let cleaned = cleaned.trim_end_matches('+');

    if let Ok(value) = cleaned.parse::<i64>() {
        return (value >= 0).then_some(value);
    }
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value <= i64::MAX as f64 => {
            Some(value.round() as i64)
        }
        _ => None,
    }
}

/// Splits a comma-separated investor cell into trimmed, non-empty names.
pub fn split_investors(cell: &str) -> impl Iterator<Item = &str> {
    cell.split(',').map(str::trim).filter(|name| !name.is_empty())
}

/// Reads the export at `path`.
///
/// A missing file is [`PipelineError::SourceNotFound`], never an empty table.
pub fn read_source(path: &Path) -> Result<SourceTable> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PipelineError::SourceNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(PipelineError::SourceParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };
    read_source_from(file, path)
}

/// Reads an export from any byte stream; `path` is only used in messages.
pub fn read_source_from<R: Read>(reader: R, path: &Path) -> Result<SourceTable> {
    let parse_err = |message: String| PipelineError::SourceParse {
        path: path.to_path_buf(),
        message,
    };

    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = csv_reader
        .byte_headers()
        .map_err(|e| parse_err(e.to_string()))?
        .clone();
    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let raw = if i == 0 { raw.strip_prefix(UTF8_BOM).unwrap_or(raw) } else { raw };
            canonicalize_header(&decode_latin1(raw))
        })
        .collect();
    debug!(?columns, "Canonical source columns");

    let layout = ColumnLayout::resolve(&columns).map_err(parse_err)?;

    let mut table = SourceTable {
        columns,
        ..SourceTable::default()
    };

    for result in csv_reader.byte_records() {
        let record = result.map_err(|e| parse_err(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let raw_date = cell(&record, Some(layout.date));
        let date = raw_date.as_deref().and_then(parse_date);
        if raw_date.is_some() && date.is_none() {
            debug!(line, raw = raw_date.as_deref(), "Unparseable date treated as missing");
            table.invalid_dates += 1;
        }

        let amount_usd = cell(&record, Some(layout.amount_usd)).map(|raw| match parse_amount(&raw) {
            Some(value) => Amount::Usd(value),
            None => {
                debug!(line, raw = raw.as_str(), "Amount is not a number");
                table.invalid_amounts += 1;
                Amount::Unparsed(raw)
            }
        });

        table.records.push(SourceRecord {
            line,
            temp_id: cell(&record, layout.temp_id),
            startup_name: cell(&record, Some(layout.startup_name)),
            city: cell(&record, Some(layout.city)),
            industry: cell(&record, Some(layout.industry)),
            investors: cell(&record, Some(layout.investors)),
            date,
            round_type: cell(&record, Some(layout.round_type)),
            amount_usd,
        });
    }

    info!(rows = table.len(), path = %path.display(), "Read source rows");
    if table.invalid_dates > 0 {
        warn!(count = table.invalid_dates, "Source rows with unparseable dates");
    }
    if table.invalid_amounts > 0 {
        warn!(count = table.invalid_amounts, "Source rows with unparseable amounts");
    }
    Ok(table)
}

/// Positions of the canonical columns within a record.
struct ColumnLayout {
    temp_id: Option<usize>,
    startup_name: usize,
    city: usize,
    industry: usize,
    investors: usize,
    date: usize,
    round_type: usize,
    amount_usd: usize,
}

impl ColumnLayout {
    fn resolve(columns: &[String]) -> std::result::Result<Self, String> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (i, name) in columns.iter().enumerate() {
            positions.entry(name.as_str()).or_insert(i);
        }

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !positions.contains_key(c))
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing required column(s): {}", missing.join(", ")));
        }

        let at = |name: &str| positions[name];
        Ok(Self {
            temp_id: positions.get("temp_id").copied(),
            startup_name: at("startup_name"),
            city: at("city"),
            industry: at("industry"),
            investors: at("investors"),
            date: at("date"),
            round_type: at("round_type"),
            amount_usd: at("amount_usd"),
        })
    }
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// A trimmed cell value, or `None` when the cell is missing or an NA marker.
fn cell(record: &ByteRecord, index: Option<usize>) -> Option<String> {
    let raw = decode_latin1(record.get(index?)?);
    let value = raw.trim();
    if NA_VALUES.contains(&value) {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_headers_and_aliases() {
        assert_eq!(canonicalize_header("Startup Name"), "startup_name");
        assert_eq!(canonicalize_header(" Amount in USD "), "amount_usd");
        assert_eq!(canonicalize_header("S No:"), "temp_id");
        assert_eq!(canonicalize_header("Round_Type"), "round_type");
    }

    #[test]
    fn parses_supported_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2015, 1, 9).unwrap();
        assert_eq!(parse_date("2015-01-09"), Some(expected));
        assert_eq!(parse_date("09/01/2015"), Some(expected));
        assert_eq!(parse_date("09.01.2015"), Some(expected));
        assert_eq!(parse_date("2015-01-09 10:30:00"), Some(expected));
        assert_eq!(parse_date("2015-01-09T10:30:00Z"), Some(expected));
    }

    #[test]
    fn invalid_dates_become_none() {
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("31/02/2015"), None);
        assert_eq!(parse_date("05/072018"), None);
    }

    #[test]
    fn parses_amounts() {
        assert_eq!(parse_amount("50000000"), Some(50_000_000));
        assert_eq!(parse_amount("1,30,00,000"), Some(13_000_000));
        assert_eq!(parse_amount("14342000+"), Some(14_342_000));
        assert_eq!(parse_amount("2.5e6"), Some(2_500_000));
        assert_eq!(parse_amount("undisclosed"), None);
        assert_eq!(parse_amount("-5"), None);
    }

    #[test]
    fn splits_investor_cells() {
        let names: Vec<&str> = split_investors(" SoftBank,, Tiger Global , ").collect();
        assert_eq!(names, vec!["SoftBank", "Tiger Global"]);
    }

    #[test]
    fn na_markers_are_absent() {
        let record = ByteRecord::from(vec!["NaN", " ", "Ola", "N/A"]);
        assert_eq!(cell(&record, Some(0)), None);
        assert_eq!(cell(&record, Some(1)), None);
        assert_eq!(cell(&record, Some(2)), Some("Ola".to_string()));
        assert_eq!(cell(&record, Some(3)), None);
        assert_eq!(cell(&record, Some(9)), None);
        assert_eq!(cell(&record, None), None);
    }

    #[test]
    fn latin1_bytes_decode_without_error() {
        assert_eq!(decode_latin1(b"Caf\xe9"), "Café");
    }
}
