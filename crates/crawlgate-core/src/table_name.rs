//! Table name suffix policy
//!
//! Periodic crawls write into date-stamped tables so that each day, week or
//! month lands in its own table. Resolution takes the date explicitly so the
//! result is repeatable for a fixed clock.

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

const SUFFIX_FORMAT: &str = "%Y_%m_%d";

/// Date-stamped suffix appended to a base table name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TableSuffix {
    #[default]
    None,
    Today,
    MostRecentMonday,
    FirstDayOfCurrentMonth,
}

impl TableSuffix {
    /// Date the suffix is stamped with, or `None` when no suffix applies
    pub fn anchor_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            TableSuffix::None => None,
            TableSuffix::Today => Some(today),
            TableSuffix::MostRecentMonday => Some(
                today - Duration::days(i64::from(today.weekday().num_days_from_monday())),
            ),
            TableSuffix::FirstDayOfCurrentMonth => today.with_day(1),
        }
    }
}

/// Source of "today" for table naming
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to one date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Physical table name for `base_name` under `policy` on `today`
pub fn resolve(base_name: &str, policy: TableSuffix, today: NaiveDate) -> String {
    match policy.anchor_date(today) {
        Some(date) => format!("{}_{}", base_name, date.format(SUFFIX_FORMAT)),
        None => base_name.to_string(),
    }
}
