use std::collections::BTreeSet;

use chrono::{Datelike, Month, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid month {month}/{year}")]
pub struct InvalidMonth {
    pub year: i32,
    pub month: u32,
}

/// A calendar month, inclusive of its first and last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub year: i32,
    pub month: u32,
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl MonthRange {
    pub fn new(year: i32, month: u32) -> Result<Self, InvalidMonth> {
        let invalid = InvalidMonth { year, month };
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or(invalid)?;
        let last = next.pred_opt().ok_or(invalid)?;
        Ok(Self {
            year,
            month,
            first,
            last,
        })
    }

    pub fn containing(date: NaiveDate) -> Self {
        let first = date.with_day(1).unwrap_or(date);
        let last = Self::new(date.year(), date.month())
            .map(|m| m.last)
            .unwrap_or(date);
        Self {
            year: date.year(),
            month: date.month(),
            first,
            last,
        }
    }

    pub fn days(&self) -> u32 {
        self.last.day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first && date <= self.last
    }

    /// "March 2026"
    pub fn title(&self) -> String {
        let name = u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("Unknown");
        format!("{name} {}", self.year)
    }
}

/// Distinct dates inside `month` with at least one successful check-in.
pub fn present_days(records: &[AttendanceRecord], month: &MonthRange) -> usize {
    records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Succeeded && month.contains(r.date))
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .len()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReportStats {
    pub total_records: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Dates with any record at all.
    pub unique_days: usize,
    pub present_days: usize,
    pub days_in_month: u32,
}

impl ReportStats {
    pub fn compute(records: &[AttendanceRecord], month: &MonthRange) -> Self {
        Self {
            total_records: records.len(),
            succeeded: records.iter().filter(|r| r.is_success()).count(),
            failed: records
                .iter()
                .filter(|r| r.status == AttendanceStatus::Failed)
                .count(),
            unique_days: records.iter().map(|r| r.date).collect::<BTreeSet<_>>().len(),
            present_days: present_days(records, month),
            days_in_month: month.days(),
        }
    }
}

/// One user's month, newest record first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonthlyReport {
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 3)]
    pub month: u32,
    #[schema(example = "March 2026")]
    pub title: String,
    pub stats: ReportStats,
    pub records: Vec<AttendanceRecord>,
}

impl MonthlyReport {
    pub fn build(month: &MonthRange, mut records: Vec<AttendanceRecord>) -> Self {
        records.retain(|r| month.contains(r.date));
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Self {
            year: month.year,
            month: month.month,
            title: month.title(),
            stats: ReportStats::compute(&records, month),
            records,
        }
    }

    pub fn present_days(&self) -> usize {
        self.stats.present_days
    }
}
