//! Reading the planning workbook into a header + rows table

use std::collections::BTreeMap;
use std::path::Path;

use calamine::{Data, ExcelDateTime, Reader, Xlsx, open_workbook};
use chrono::{Days, NaiveDate};

use crate::error::{EtlError, Result};

/// First day of the 1900 date system, as counted by Excel serial numbers
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
/// 9999-12-31
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

/// Date layouts accepted in text cells
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// The first worksheet of a workbook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Data>>,
}

impl Sheet {
    /// Read the first worksheet; the first row holds the headers.
    pub fn read(path: &Path) -> Result<Self> {
        let mut workbook: Xlsx<_> = open_workbook(path)?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| EtlError::validation(format!("{} has no sheets", path.display())))?;

        let range = workbook.worksheet_range(&sheet_name)?;
        let mut rows = range.rows();

        let headers = match rows.next() {
            Some(header_row) => header_row.iter().map(cell_text).collect(),
            None => Vec::new(),
        };

        let rows = rows
            .filter(|row| !row.iter().all(is_blank))
            .map(|row| row.to_vec())
            .collect();

        Ok(Self { headers, rows })
    }

    /// Rename headers through `map`. Headers and keys are compared trimmed;
    /// unmapped headers are left as they are.
    pub fn rename_columns(&mut self, map: &BTreeMap<String, String>) {
        for header in &mut self.headers {
            if let Some((_, field)) = map.iter().find(|(from, _)| from.trim() == header.trim()) {
                *header = field.clone();
            }
        }
    }

    /// Index of the first column named `name`
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name.trim())
    }
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Render a cell as text; whole floats lose their fraction (`2024.0` -> `2024`)
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => cell_date(cell)
            .map(|d| d.to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Coerce a cell into a date, `None` when it does not hold one
pub fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) if dt.is_datetime() => date_cell(dt),
        Data::Float(f) => serial_to_date(*f),
        Data::Int(i) => serial_to_date(*i as f64),
        Data::String(s) | Data::DateTimeIso(s) => parse_date_text(s),
        _ => None,
    }
}

/// Typed date cells carry their workbook's date system (1900 or 1904)
fn date_cell(dt: &ExcelDateTime) -> Option<NaiveDate> {
    if !in_serial_range(dt.as_f64()) {
        return None;
    }
    dt.as_datetime().map(|datetime| datetime.date())
}

fn in_serial_range(serial: f64) -> bool {
    serial.is_finite() && (1.0..=EXCEL_MAX_SERIAL).contains(&serial)
}

/// Untyped numbers are read in the 1900 date system
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !in_serial_range(serial) {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(serial.floor() as u64))
}

/// Parse the date part of a text cell; a trailing time is ignored.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let date_part = text
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or_default();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}
