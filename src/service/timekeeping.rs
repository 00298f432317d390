//! Per-record time arithmetic: lateness at check-in, worked hours, and the
//! record values produced when a correction is applied.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::model::{
    attendance::{AttendanceStatus, AttendanceTimes},
    correction::CorrectionRequest,
    shift::Shift,
};

/// Lateness of a check-in against the shift starting on `date`.
///
/// A check-in after `start + grace` is late by the whole minutes elapsed since
/// the shift start, rounded up so a late record never carries zero minutes.
pub fn evaluate_check_in(
    shift: &Shift,
    date: NaiveDate,
    check_in: NaiveDateTime,
) -> (AttendanceStatus, u32) {
    let start = date.and_time(shift.start_time);
    let grace_end = start + Duration::minutes(i64::from(shift.late_grace_minutes));

    if check_in <= grace_end {
        return (AttendanceStatus::OnTime, 0);
    }

    let seconds_late = (check_in - start).num_seconds();
    let minutes = (seconds_late + 59) / 60;
    (
        AttendanceStatus::Late,
        u32::try_from(minutes.max(1)).unwrap_or(u32::MAX),
    )
}

/// Hours between check-in and check-out; zero unless both exist in order.
pub fn work_hours(check_in: Option<NaiveDateTime>, check_out: Option<NaiveDateTime>) -> f64 {
    match (check_in, check_out) {
        (Some(start), Some(end)) if end > start => (end - start).num_seconds() as f64 / 3600.0,
        _ => 0.0,
    }
}

/// Values of the target attendance row once `request` is approved.
///
/// Proposed times override the stored ones; anything not proposed is kept.
/// Status and lateness are re-derived from the resulting check-in. Without a
/// check-in the stored status stands, and an absent day stays absent with no
/// timestamps.
pub fn merge_correction(
    existing: Option<&AttendanceTimes>,
    request: &CorrectionRequest,
    shift: &Shift,
) -> AttendanceTimes {
    let check_in = request
        .new_check_in
        .or_else(|| existing.and_then(|t| t.check_in));
    let mut check_out = request
        .new_check_out
        .or_else(|| existing.and_then(|t| t.check_out));

    let (status, late_minutes) = match (check_in, existing) {
        (Some(at), _) => evaluate_check_in(shift, request.date, at),
        (None, Some(stored)) => (stored.status, stored.late_minutes),
        (None, None) => (AttendanceStatus::OnTime, 0),
    };
    if status == AttendanceStatus::Absent {
        check_out = None;
    }

    AttendanceTimes {
        check_in,
        check_out,
        work_hours: work_hours(check_in, check_out),
        status,
        late_minutes,
    }
}
