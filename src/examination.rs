//! Examination deadline and overdue status.
//!
//! Pure computation over a patient's four tracked dates, the per-patient
//! interval and the evaluation date. Monitoring, roster filtering and the
//! exports all derive their counts from `evaluate`.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::{EventDates, Urgency};

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Fewer days left than this is critical.
const CRITICAL_DAYS: i64 = 3;

/// Fewer days left than this is a warning.
const WARNING_DAYS: i64 = 7;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExaminationStatus {
    /// Most recent contact date, `None` when it cannot be determined.
    pub last_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    pub is_overdue: bool,
}

impl ExaminationStatus {
    /// Signed days from `today` to the deadline.
    pub fn days_left(&self, today: NaiveDate) -> Option<i64> {
        self.deadline.map(|d| (d - today).num_days())
    }

    pub fn urgency(&self, today: NaiveDate) -> Option<Urgency> {
        self.days_left(today).map(urgency_for)
    }
}

// ═══════════════════════════════════════════════════════════
// Computation
// ═══════════════════════════════════════════════════════════

/// Latest of the present dates; `None` only if all are absent.
fn latest(dates: &[Option<NaiveDate>]) -> Option<NaiveDate> {
    dates.iter().flatten().max().copied()
}

/// Last contact date by hospitalization state, in precedence order.
pub fn last_contact_date(dates: &EventDates, today: NaiveDate) -> Option<NaiveDate> {
    let appointment = dates.last_psychiatric_appointment_date;
    let home_visit = dates.last_home_visit_by_doctor_date;

    match (dates.last_hospitalization_from, dates.last_hospitalization_to) {
        // End predates start: treated as still hospitalized.
        (Some(from), Some(to)) if from > to => Some(today),
        (Some(_), None) => Some(today),
        (None, Some(to)) | (Some(_), Some(to)) => latest(&[Some(to), appointment, home_visit]),
        (None, None) => latest(&[appointment, home_visit]),
    }
}

/// A deadline past the calendar range is treated like a missing one.
pub fn evaluate(dates: &EventDates, interval_days: i32, today: NaiveDate) -> ExaminationStatus {
    let last_date = last_contact_date(dates, today);
    let deadline = last_date.and_then(|d| d.checked_add_signed(Duration::days(i64::from(interval_days))));
    let is_overdue = match deadline {
        None => true,
        Some(deadline) => deadline < today,
    };
    ExaminationStatus { last_date, deadline, is_overdue }
}

pub fn urgency_for(days_left: i64) -> Urgency {
    if days_left < CRITICAL_DAYS {
        Urgency::Critical
    } else if days_left < WARNING_DAYS {
        Urgency::Warning
    } else {
        Urgency::Ok
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
