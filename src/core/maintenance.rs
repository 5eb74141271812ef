//! Maintenance due-date arithmetic and status colour coding

use chrono::{Days, NaiveDate};
use console::{style, StyledObject};
use serde::Serialize;

/// Default number of days before the due date at which equipment is flagged
pub const DEFAULT_DUE_SOON_DAYS: i64 = 30;

/// Longest maintenance frequency or look-ahead window accepted, in days
pub const MAX_DAYS: i64 = 36_500;

/// Add a number of days to a date, `None` when negative or out of range
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    u64::try_from(days)
        .ok()
        .and_then(|d| date.checked_add_days(Days::new(d)))
}

/// Compute the next maintenance date from the last one and a frequency in days
pub fn next_due(last: Option<NaiveDate>, frequency_days: Option<i64>) -> Option<NaiveDate> {
    match (last, frequency_days) {
        (Some(last), Some(freq)) if freq > 0 => add_days(last, freq),
        _ => None,
    }
}

/// Maintenance state of a piece of equipment relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Overdue,
    DueSoon,
    Ok,
    Unscheduled,
}

impl MaintenanceStatus {
    /// Classify a due date against today using the due-soon threshold
    pub fn classify(next_due: Option<NaiveDate>, today: NaiveDate, due_soon_days: i64) -> Self {
        match next_due {
            None => MaintenanceStatus::Unscheduled,
            Some(due) => {
                let remaining = (due - today).num_days();
                if remaining < 0 {
                    MaintenanceStatus::Overdue
                } else if remaining <= due_soon_days {
                    MaintenanceStatus::DueSoon
                } else {
                    MaintenanceStatus::Ok
                }
            }
        }
    }

    /// Colour name used by the legacy screens and in exported data
    pub fn color(&self) -> &'static str {
        match self {
            MaintenanceStatus::Overdue => "red",
            MaintenanceStatus::DueSoon => "yellow",
            MaintenanceStatus::Ok => "green",
            MaintenanceStatus::Unscheduled => "grey",
        }
    }

    /// Whether the equipment needs attention (overdue or due soon)
    pub fn needs_attention(&self) -> bool {
        matches!(self, MaintenanceStatus::Overdue | MaintenanceStatus::DueSoon)
    }

    /// Terminal-styled label
    pub fn styled(&self) -> StyledObject<String> {
        let label = self.to_string();
        match self {
            MaintenanceStatus::Overdue => style(label).red().bold(),
            MaintenanceStatus::DueSoon => style(label).yellow(),
            MaintenanceStatus::Ok => style(label).green(),
            MaintenanceStatus::Unscheduled => style(label).dim(),
        }
    }
}

impl std::fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaintenanceStatus::Overdue => write!(f, "overdue"),
            MaintenanceStatus::DueSoon => write!(f, "due_soon"),
            MaintenanceStatus::Ok => write!(f, "ok"),
            MaintenanceStatus::Unscheduled => write!(f, "unscheduled"),
        }
    }
}

impl std::str::FromStr for MaintenanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "overdue" => Ok(MaintenanceStatus::Overdue),
            "due_soon" | "soon" => Ok(MaintenanceStatus::DueSoon),
            "ok" => Ok(MaintenanceStatus::Ok),
            "unscheduled" => Ok(MaintenanceStatus::Unscheduled),
            _ => Err(format!(
                "Invalid maintenance status: {}. Use overdue, due_soon, ok or unscheduled",
                s
            )),
        }
    }
}

/// Due date, days remaining and status for one piece of equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaintenanceInfo {
    pub next_due: Option<NaiveDate>,
    pub days_remaining: Option<i64>,
    pub status: MaintenanceStatus,
}

impl MaintenanceInfo {
    pub fn compute(
        last: Option<NaiveDate>,
        frequency_days: Option<i64>,
        today: NaiveDate,
        due_soon_days: i64,
    ) -> Self {
        let next = next_due(last, frequency_days);
        Self {
            next_due: next,
            days_remaining: next.map(|d| (d - today).num_days()),
            status: MaintenanceStatus::classify(next, today, due_soon_days),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_due_adds_frequency() {
        assert_eq!(next_due(Some(date(2024, 1, 31)), Some(30)), Some(date(2024, 3, 1)));
        assert_eq!(next_due(None, Some(30)), None);
        assert_eq!(next_due(Some(date(2024, 1, 1)), None), None);
        assert_eq!(next_due(Some(date(2024, 1, 1)), Some(0)), None);
    }

    #[test]
    fn test_next_due_out_of_range_is_unscheduled() {
        assert_eq!(next_due(Some(date(2024, 1, 1)), Some(1_000_000_000_000_000)), None);
        let info = MaintenanceInfo::compute(
            Some(date(2024, 1, 1)),
            Some(i64::MAX),
            date(2024, 6, 1),
            30,
        );
        assert_eq!(info.status, MaintenanceStatus::Unscheduled);
        assert_eq!(add_days(date(2024, 1, 1), -1), None);
    }

    #[test]
    fn test_classify_boundaries() {
        let today = date(2024, 6, 1);
        assert_eq!(
            MaintenanceStatus::classify(Some(date(2024, 5, 31)), today, 30),
            MaintenanceStatus::Overdue
        );
        assert_eq!(
            MaintenanceStatus::classify(Some(today), today, 30),
            MaintenanceStatus::DueSoon
        );
        assert_eq!(
            MaintenanceStatus::classify(Some(date(2024, 7, 1)), today, 30),
            MaintenanceStatus::DueSoon
        );
        assert_eq!(
            MaintenanceStatus::classify(Some(date(2024, 7, 2)), today, 30),
            MaintenanceStatus::Ok
        );
        assert_eq!(
            MaintenanceStatus::classify(None, today, 30),
            MaintenanceStatus::Unscheduled
        );
    }

    #[test]
    fn test_colors() {
        assert_eq!(MaintenanceStatus::Overdue.color(), "red");
        assert_eq!(MaintenanceStatus::DueSoon.color(), "yellow");
        assert_eq!(MaintenanceStatus::Ok.color(), "green");
        assert_eq!(MaintenanceStatus::Unscheduled.color(), "grey");
    }

    #[test]
    fn test_info_days_remaining() {
        let info = MaintenanceInfo::compute(Some(date(2024, 1, 1)), Some(10), date(2024, 1, 5), 30);
        assert_eq!(info.next_due, Some(date(2024, 1, 11)));
        assert_eq!(info.days_remaining, Some(6));
        assert_eq!(info.status, MaintenanceStatus::DueSoon);
    }
}
