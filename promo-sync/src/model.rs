//! Campaign rows and the lifecycle statuses stored alongside them

use chrono::NaiveDate;

/// Lifecycle of a campaign relative to the run date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    Upcoming,
    Ongoing,
    Completed,
}

impl CampaignStatus {
    /// Derive the status from the validity window.
    ///
    /// An ended campaign is completed even if its start date is later than
    /// its end date.
    pub fn derive(start_date: NaiveDate, end_date: NaiveDate, today: NaiveDate) -> Self {
        if end_date < today {
            CampaignStatus::Completed
        } else if start_date > today {
            CampaignStatus::Upcoming
        } else {
            CampaignStatus::Ongoing
        }
    }

    /// Value stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Upcoming => "upcoming",
            CampaignStatus::Ongoing => "ongoing",
            CampaignStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status shared by steps and sub-steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    ToDo,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "to_do",
            TaskStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted campaign, in the column order of the campaigns table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CampaignStatus,
    /// `<year>-<raw code>`
    pub code: String,
    pub clearance_date: NaiveDate,
}

impl Campaign {
    /// Campaign table columns, in insert order
    pub const COLUMNS: [&'static str; 6] = [
        "title",
        "start_date",
        "end_date",
        "status",
        "code",
        "clearance_date",
    ];
}

/// Build the composite campaign code
pub fn campaign_code(year: &str, raw_code: &str) -> String {
    format!("{}-{}", year, raw_code)
}
