//! Inclusive date ranges.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// A stay window `[start_date, end_date]`, both ends inclusive.
///
/// Construction does not validate ordering: the ledger treats a reversed
/// range as "not claimable" rather than as an error, so callers decide
/// what an inverted range means via [`DateRange::is_ordered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    /// Returns true if `start_date <= end_date`.
    pub fn is_ordered(&self) -> bool {
        self.start_date <= self.end_date
    }

    /// Number of nights between start and end (zero for reversed ranges).
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days().max(0)
    }

    /// Every date in the range, start and end included.
    ///
    /// Empty for a reversed range.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let end = self.end_date;
        self.start_date
            .iter_days()
            .take_while(move |d| *d <= end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Returns true if the two ranges share at least one date.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.is_ordered()
            && other.is_ordered()
            && self.start_date <= other.end_date
            && other.start_date <= self.end_date
    }

    /// Range shifted forward by `days` on both ends.
    pub fn shifted(&self, days: u64) -> Self {
        Self {
            start_date: self.start_date + Days::new(days),
            end_date: self.end_date + Days::new(days),
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start_date, self.end_date)
    }
}
