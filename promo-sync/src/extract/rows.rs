//! Turning renamed spreadsheet rows into campaigns

use calamine::Data;
use chrono::NaiveDate;

use super::sheet::{Sheet, cell_date, cell_text};
use crate::config::fields;
use crate::error::{EtlError, Result};
use crate::model::{Campaign, CampaignStatus, campaign_code};

/// Campaigns kept from a sheet, with the rows that were dropped on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub campaigns: Vec<Campaign>,
    pub total_rows: usize,
    /// Rows whose start, end or clearance date could not be read
    pub dropped_rows: usize,
}

/// Column positions of the fields a campaign is built from
struct Columns {
    title: usize,
    start_date: usize,
    end_date: usize,
    clearance_date: usize,
    raw_code: usize,
    year: usize,
}

impl Columns {
    fn locate(sheet: &Sheet, year_column: &str) -> Result<Self> {
        let find = |name: &str| {
            sheet.column(name).ok_or_else(|| {
                EtlError::validation(format!("spreadsheet has no '{}' column", name))
            })
        };

        Ok(Self {
            title: find(fields::TITLE)?,
            start_date: find(fields::START_DATE)?,
            end_date: find(fields::END_DATE)?,
            clearance_date: find(fields::CLEARANCE_DATE)?,
            raw_code: find(fields::RAW_CODE)?,
            year: find(year_column)?,
        })
    }
}

/// Build campaigns from a sheet whose headers are already renamed.
///
/// Rows where any of the three dates is unreadable are dropped. `today` is
/// fixed by the caller so every row is judged against the same date.
pub fn campaigns_from_sheet(
    sheet: &Sheet,
    year_column: &str,
    today: NaiveDate,
) -> Result<Extraction> {
    let cols = Columns::locate(sheet, year_column)?;
    let cell = |row: &[Data], idx: usize| row.get(idx).cloned().unwrap_or(Data::Empty);

    let mut campaigns = Vec::with_capacity(sheet.rows.len());
    for row in &sheet.rows {
        let dates = (
            cell_date(&cell(row, cols.start_date)),
            cell_date(&cell(row, cols.end_date)),
            cell_date(&cell(row, cols.clearance_date)),
        );
        let (Some(start_date), Some(end_date), Some(clearance_date)) = dates else {
            continue;
        };

        campaigns.push(Campaign {
            title: cell_text(&cell(row, cols.title)),
            start_date,
            end_date,
            status: CampaignStatus::derive(start_date, end_date, today),
            code: campaign_code(
                &cell_text(&cell(row, cols.year)),
                &cell_text(&cell(row, cols.raw_code)),
            ),
            clearance_date,
        });
    }

    Ok(Extraction {
        total_rows: sheet.rows.len(),
        dropped_rows: sheet.rows.len() - campaigns.len(),
        campaigns,
    })
}
