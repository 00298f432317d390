//! Grouping of raw attendance records into per-employee day and month views.
//!
//! Group membership is record-driven: an employee without any record in the
//! input does not get a group. Roster completeness is the job of the
//! absence sweep that materializes explicit `absent` rows.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    model::attendance::{AttendanceRecord, AttendanceStatus},
};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EmployeeDayGroup {
    pub employee_id: u64,
    pub employee_name: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub records: Vec<AttendanceRecord>,
    pub total_hours: f64,
    pub late_count: u32,
    pub late_minutes: u32,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeMonthGroup {
    pub employee_id: u64,
    pub employee_name: String,
    pub year: i32,
    pub month: u32,
    pub total_hours: f64,
    pub late_count: u32,
    pub late_minutes: u32,
    pub absence_count: u32,
    pub days: Vec<DayCell>,
}

/// One calendar cell of a month view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub summary: DaySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DaySummary {
    /// No row exists for the day. Not the same as `absent`, which needs an explicit row.
    NotRecorded,
    Recorded {
        first_event: Option<NaiveDateTime>,
        last_event: Option<NaiveDateTime>,
        total_hours: f64,
        late_minutes: u32,
        status: AttendanceStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Totals {
    total_hours: f64,
    late_count: u32,
    late_minutes: u32,
    absence_count: u32,
    status: AttendanceStatus,
}

fn severity(status: AttendanceStatus) -> u8 {
    match status {
        AttendanceStatus::OnTime => 0,
        AttendanceStatus::Late => 1,
        AttendanceStatus::Absent => 2,
    }
}

fn summarize<'a, I>(records: I) -> Totals
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    records.into_iter().fold(
        Totals {
            total_hours: 0.0,
            late_count: 0,
            late_minutes: 0,
            absence_count: 0,
            status: AttendanceStatus::OnTime,
        },
        |mut acc, record| {
            acc.total_hours += record.effective_hours();
            acc.late_minutes = acc.late_minutes.saturating_add(record.late_minutes);
            match record.status {
                AttendanceStatus::Late => acc.late_count += 1,
                AttendanceStatus::Absent => acc.absence_count += 1,
                AttendanceStatus::OnTime => {}
            }
            if severity(record.status) > severity(acc.status) {
                acc.status = record.status;
            }
            acc
        },
    )
}

/// Partitions by employee id, keeping input order inside each partition.
fn partition_by_employee(records: &[AttendanceRecord]) -> BTreeMap<u64, Vec<&AttendanceRecord>> {
    let mut partitions: BTreeMap<u64, Vec<&AttendanceRecord>> = BTreeMap::new();
    for record in records {
        partitions.entry(record.employee_id).or_default().push(record);
    }
    partitions
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation(format!("invalid month {year}-{month:02}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| AppError::validation(format!("invalid month {year}-{month:02}")))?;

    Ok((first, next.pred_opt().unwrap_or(first)))
}

pub fn group_by_employee_and_day(
    records: &[AttendanceRecord],
    day: NaiveDate,
) -> AppResult<Vec<EmployeeDayGroup>> {
    if let Some(stray) = records.iter().find(|r| r.date != day) {
        return Err(AppError::validation(format!(
            "attendance {} is dated {}, expected {}",
            stray.id, stray.date, day
        )));
    }

    let mut groups: Vec<EmployeeDayGroup> = partition_by_employee(records)
        .into_iter()
        .map(|(employee_id, mut partition)| {
            // Stable: records sharing a check-in keep their input order.
            partition.sort_by_key(|r| (r.check_in.is_none(), r.check_in));
            let totals = summarize(partition.iter().copied());

            EmployeeDayGroup {
                employee_id,
                employee_name: partition[0].employee_name.clone(),
                date: day,
                records: partition.into_iter().cloned().collect(),
                total_hours: totals.total_hours,
                late_count: totals.late_count,
                late_minutes: totals.late_minutes,
                status: totals.status,
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        a.employee_name
            .cmp(&b.employee_name)
            .then(a.employee_id.cmp(&b.employee_id))
    });
    Ok(groups)
}

pub fn group_by_employee_and_month(
    records: &[AttendanceRecord],
    year: i32,
    month: u32,
) -> AppResult<Vec<EmployeeMonthGroup>> {
    let (first, last) = month_bounds(year, month)?;

    if let Some(stray) = records.iter().find(|r| r.date < first || r.date > last) {
        return Err(AppError::validation(format!(
            "attendance {} is dated {}, outside {year}-{month:02}",
            stray.id, stray.date
        )));
    }

    let mut groups: Vec<EmployeeMonthGroup> = partition_by_employee(records)
        .into_iter()
        .map(|(employee_id, partition)| {
            let totals = summarize(partition.iter().copied());

            let mut by_day: BTreeMap<NaiveDate, Vec<&AttendanceRecord>> = BTreeMap::new();
            for record in partition.iter().copied() {
                by_day.entry(record.date).or_default().push(record);
            }

            let days = first
                .iter_days()
                .take_while(|d| *d <= last)
                .map(|date| DayCell {
                    date,
                    summary: match by_day.get(&date) {
                        None => DaySummary::NotRecorded,
                        Some(day_records) => day_summary(day_records),
                    },
                })
                .collect();

            EmployeeMonthGroup {
                employee_id,
                employee_name: partition[0].employee_name.clone(),
                year: first.year(),
                month: first.month(),
                total_hours: totals.total_hours,
                late_count: totals.late_count,
                late_minutes: totals.late_minutes,
                absence_count: totals.absence_count,
                days,
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        a.employee_name
            .cmp(&b.employee_name)
            .then(a.employee_id.cmp(&b.employee_id))
    });
    Ok(groups)
}

fn day_summary(records: &[&AttendanceRecord]) -> DaySummary {
    let totals = summarize(records.iter().copied());
    let events = records
        .iter()
        .flat_map(|r| [r.check_in, r.check_out])
        .flatten();

    let (first_event, last_event) = events.fold((None, None), |(lo, hi), at| {
        (
            Some(lo.map_or(at, |lo: NaiveDateTime| lo.min(at))),
            Some(hi.map_or(at, |hi: NaiveDateTime| hi.max(at))),
        )
    });

    DaySummary::Recorded {
        first_event,
        last_event,
        total_hours: totals.total_hours,
        late_minutes: totals.late_minutes,
        status: totals.status,
    }
}
