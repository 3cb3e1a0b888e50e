//! Range-based temporal model: calendar dates and the `time_state` trait.

use super::{LoreError, ObjectId};
use crate::primitives::OPEN_END_YEAR;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A possibly partial calendar date.
///
/// Comparison is lexicographic on `(year, month, day)` with a missing month
/// or day counting as 1, so `1850` and `1850-01-01` compare equal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemporalDate {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

impl TemporalDate {
    /// A date known only to the year.
    #[must_use]
    pub const fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    /// A fully specified date.
    #[must_use]
    pub const fn ymd(year: i32, month: u8, day: u8) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
        }
    }

    fn sort_key(&self) -> (i32, u8, u8) {
        (self.year, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }
}

impl PartialEq for TemporalDate {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for TemporalDate {}

impl PartialOrd for TemporalDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TemporalDate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for TemporalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.month, self.day) {
            (Some(m), Some(d)) => write!(f, "{}-{:02}-{:02}", self.year, m, d),
            (Some(m), None) => write!(f, "{}-{:02}", self.year, m),
            _ => write!(f, "{}", self.year),
        }
    }
}

/// Parses `YYYY`, `YYYY-MM` or `YYYY-MM-DD`; a leading `-` marks a year before 0.
impl FromStr for TemporalDate {
    type Err = LoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LoreError::Rejected(format!("Invalid date: {}", s));
        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut parts = rest.split('-');
        let year: i32 = parts.next().and_then(|y| y.parse().ok()).ok_or_else(invalid)?;
        let month = parts
            .next()
            .map(|m| m.parse::<u8>().ok().filter(|m| (1..=12).contains(m)).ok_or_else(invalid))
            .transpose()?;
        let day = parts
            .next()
            .map(|d| d.parse::<u8>().ok().filter(|d| (1..=31).contains(d)).ok_or_else(invalid))
            .transpose()?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            year: if negative { year.saturating_neg() } else { year },
            month,
            day,
        })
    }
}

/// Temporal trait of an object.
///
/// Snapshots carry an `effective_date` and usually a `parent_identity_id`;
/// a base identity carries a `TimeState` only to hold its `time_children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeState {
    pub is_historical_snapshot: bool,
    /// Start of the range. `None` means unbounded in the past.
    pub effective_date: Option<TemporalDate>,
    /// End of the range, inclusive. `None` means ongoing.
    pub valid_until: Option<TemporalDate>,
    /// The base identity this is a snapshot of.
    pub parent_identity_id: Option<ObjectId>,
    /// Snapshots nested directly inside this one's range.
    pub time_children: Vec<ObjectId>,
}

impl TimeState {
    /// Time state for a base identity (holds children only).
    #[must_use]
    pub fn anchor() -> Self {
        Self {
            is_historical_snapshot: false,
            effective_date: None,
            valid_until: None,
            parent_identity_id: None,
            time_children: Vec::new(),
        }
    }

    /// Time state for a snapshot of `base` over `[start, end]`.
    #[must_use]
    pub fn snapshot(base: ObjectId, start: TemporalDate, end: Option<TemporalDate>) -> Self {
        Self {
            is_historical_snapshot: true,
            effective_date: Some(start),
            valid_until: end,
            parent_identity_id: Some(base),
            time_children: Vec::new(),
        }
    }

    /// Time state of a time-bounded link (not a snapshot).
    #[must_use]
    pub fn bounded(start: Option<TemporalDate>, end: Option<TemporalDate>) -> Self {
        Self {
            effective_date: start,
            valid_until: end,
            ..Self::anchor()
        }
    }

    /// True if `at` falls inside the inclusive range.
    #[must_use]
    pub fn covers(&self, at: &TemporalDate) -> bool {
        self.effective_date.is_none_or(|s| s <= *at) && self.valid_until.is_none_or(|e| *at <= e)
    }

    /// True if the inclusive range intersects `[start, end]`.
    #[must_use]
    pub fn overlaps(&self, start: &TemporalDate, end: &TemporalDate) -> bool {
        self.effective_date.is_none_or(|s| s <= *end) && self.valid_until.is_none_or(|e| e >= *start)
    }

    /// Width of the range in whole years; an open end counts as `OPEN_END_YEAR`.
    ///
    /// Returns `None` when the start is unbounded.
    #[must_use]
    pub fn span_years(&self) -> Option<i64> {
        let start = self.effective_date?;
        let end_year = self.valid_until.map_or(OPEN_END_YEAR, |e| e.year);
        Some(i64::from(end_year) - i64::from(start.year))
    }
}

// =============================================================================
// TESTS
// =============================================================================
