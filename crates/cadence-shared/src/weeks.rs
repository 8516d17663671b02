//! Week calendar for the scheduling grid: consecutive Sunday-anchored
//! weeks starting from the week containing a given date.

use chrono::{Datelike, Duration, NaiveDate, Utc};

use crate::constants::GRID_WEEKS;

/// One column of the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Week {
    pub index: u32,
    /// Short column header, `W1`, `W2`, ...
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Generate `count` consecutive weeks, the first being the week that
/// contains `anchor` (weeks run Sunday through Saturday).
pub fn generate_weeks(anchor: NaiveDate, count: usize) -> Vec<Week> {
    let week_start = anchor - Duration::days(i64::from(anchor.weekday().num_days_from_sunday()));

    (0..count)
        .map(|i| {
            let start = week_start + Duration::weeks(i as i64);
            Week {
                index: i as u32,
                label: format!("W{}", i + 1),
                start,
                end: start + Duration::days(6),
            }
        })
        .collect()
}

/// The default grid: [`GRID_WEEKS`] weeks starting from the current week.
pub fn current_weeks() -> Vec<Week> {
    generate_weeks(Utc::now().date_naive(), GRID_WEEKS)
}
