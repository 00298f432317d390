//! Monthly payroll derived from attendance and the active contract.
//!
//! Lines are computed on demand and never stored. `hourly_rate` is the
//! contract salary over the configured standard month hours, `gross_pay` is
//! that rate times worked hours, and `net_pay` subtracts policy deductions
//! clamped so that `0 <= net_pay <= gross_pay`.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    model::{attendance::AttendanceRecord, contract::Contract, employee::EmployeeRef},
    service::aggregation::group_by_employee_and_month,
};

/// Deduction and rate settings, loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayrollPolicy {
    pub standard_month_hours: f64,
    pub late_penalty_per_minute: f64,
    pub absence_penalty: f64,
}

impl PayrollPolicy {
    pub fn validate(&self) -> AppResult<()> {
        if !self.standard_month_hours.is_finite() || self.standard_month_hours <= 0.0 {
            return Err(AppError::InvalidConfiguration(format!(
                "standard month hours must be positive, got {}",
                self.standard_month_hours
            )));
        }
        for (name, value) in [
            ("late penalty per minute", self.late_penalty_per_minute),
            ("absence penalty", self.absence_penalty),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::InvalidConfiguration(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PayrollLine {
    pub employee_id: u64,
    pub employee_name: String,
    pub year: i32,
    pub month: u32,
    pub base_salary: f64,
    pub total_hours: f64,
    pub hourly_rate: f64,
    pub gross_pay: f64,
    pub late_count: u32,
    pub late_minutes: u32,
    pub absence_count: u32,
    pub deductions: f64,
    pub net_pay: f64,
}

pub fn compute_monthly_payroll(
    employee: &EmployeeRef,
    contract: Option<&Contract>,
    month_records: &[AttendanceRecord],
    year: i32,
    month: u32,
    policy: &PayrollPolicy,
) -> AppResult<PayrollLine> {
    policy.validate()?;

    if let Some(foreign) = month_records.iter().find(|r| r.employee_id != employee.id) {
        return Err(AppError::validation(format!(
            "attendance {} belongs to employee {}, not {}",
            foreign.id, foreign.employee_id, employee.id
        )));
    }

    // No active contract pays nothing.
    let salary = contract.map_or(0.0, |c| c.salary);
    if !salary.is_finite() || salary < 0.0 {
        return Err(AppError::validation(format!(
            "contract salary for employee {} must be a non-negative number, got {salary}",
            employee.id
        )));
    }

    let groups = group_by_employee_and_month(month_records, year, month)?;
    let (total_hours, late_count, late_minutes, absence_count) = groups
        .first()
        .map(|g| (g.total_hours, g.late_count, g.late_minutes, g.absence_count))
        .unwrap_or((0.0, 0, 0, 0));

    let hourly_rate = salary / policy.standard_month_hours;
    let gross_pay = hourly_rate * total_hours;
    let penalties = f64::from(late_minutes) * policy.late_penalty_per_minute
        + f64::from(absence_count) * policy.absence_penalty;
    let deductions = penalties.min(gross_pay).max(0.0);

    Ok(PayrollLine {
        employee_id: employee.id,
        employee_name: employee.name.clone(),
        year,
        month,
        base_salary: salary,
        total_hours,
        hourly_rate,
        gross_pay,
        late_count,
        late_minutes,
        absence_count,
        deductions,
        net_pay: gross_pay - deductions,
    })
}

/// One line per roster employee, sorted by display name. Employees without
/// attendance still get a zero-hour line; records of employees outside the
/// roster are ignored.
pub fn compute_payroll_batch(
    roster: &[EmployeeRef],
    contracts: &HashMap<u64, Contract>,
    records: &[AttendanceRecord],
    year: i32,
    month: u32,
    policy: &PayrollPolicy,
) -> AppResult<Vec<PayrollLine>> {
    policy.validate()?;

    let mut by_employee: BTreeMap<u64, Vec<AttendanceRecord>> = BTreeMap::new();
    for record in records {
        by_employee
            .entry(record.employee_id)
            .or_default()
            .push(record.clone());
    }

    let mut lines = roster
        .iter()
        .map(|employee| {
            let own = by_employee
                .get(&employee.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            compute_monthly_payroll(
                employee,
                contracts.get(&employee.id),
                own,
                year,
                month,
                policy,
            )
        })
        .collect::<AppResult<Vec<_>>>()?;

    lines.sort_by(|a, b| {
        a.employee_name
            .cmp(&b.employee_name)
            .then(a.employee_id.cmp(&b.employee_id))
    });
    Ok(lines)
}

/// Column labels of the payroll export, in output order.
pub const PAYROLL_CSV_HEADER: [&str; 13] = [
    "employee_id",
    "employee_name",
    "year",
    "month",
    "base_salary",
    "total_hours",
    "hourly_rate",
    "gross_pay",
    "late_count",
    "late_minutes",
    "absence_count",
    "deductions",
    "net_pay",
];

/// Serializes lines as CSV with one header row. Numbers are written unrounded.
pub fn export_monthly_payroll(lines: &[PayrollLine]) -> Vec<u8> {
    let mut csv = PAYROLL_CSV_HEADER.join(",");
    csv.push_str("\r\n");

    for line in lines {
        let row = [
            line.employee_id.to_string(),
            csv_field(&line.employee_name),
            line.year.to_string(),
            line.month.to_string(),
            line.base_salary.to_string(),
            line.total_hours.to_string(),
            line.hourly_rate.to_string(),
            line.gross_pay.to_string(),
            line.late_count.to_string(),
            line.late_minutes.to_string(),
            line.absence_count.to_string(),
            line.deductions.to_string(),
            line.net_pay.to_string(),
        ];
        csv.push_str(&row.join(","));
        csv.push_str("\r\n");
    }

    csv.into_bytes()
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn policy(hours: f64) -> PayrollPolicy {
        PayrollPolicy {
            standard_month_hours: hours,
            late_penalty_per_minute: 0.0,
            absence_penalty: 0.0,
        }
    }

    fn employee(id: u64, name: &str) -> EmployeeRef {
        EmployeeRef {
            id,
            name: name.to_string(),
        }
    }

    fn contract(employee_id: u64, salary: f64) -> Contract {
        Contract {
            id: employee_id,
            employee_id,
            salary,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
        }
    }

    fn worked(id: u64, employee_id: u64, day: u32, hours: f64, status: AttendanceStatus, late: u32) -> AttendanceRecord {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        AttendanceRecord {
            id,
            employee_id,
            employee_name: format!("emp-{employee_id}"),
            shift_id: 1,
            date,
            check_in: None,
            check_out: None,
            work_hours: Some(hours),
            status,
            late_minutes: late,
        }
    }

    fn full_month(employee_id: u64) -> Vec<AttendanceRecord> {
        // 20 days of 8 hours
        (1..=20)
            .map(|d| worked(d as u64, employee_id, d, 8.0, AttendanceStatus::OnTime, 0))
            .collect()
    }

    #[test]
    fn standard_month_pays_the_full_salary() {
        let line = compute_monthly_payroll(
            &employee(1, "Ana"),
            Some(&contract(1, 4_000_000.0)),
            &full_month(1),
            2024,
            3,
            &policy(160.0),
        )
        .unwrap();

        assert_eq!(line.total_hours, 160.0);
        assert_eq!(line.hourly_rate, 25_000.0);
        assert_eq!(line.gross_pay, 4_000_000.0);
        assert_eq!(line.net_pay, 4_000_000.0);
    }

    #[test]
    fn non_positive_standard_hours_is_invalid_configuration() {
        for hours in [0.0, -160.0, f64::NAN] {
            let err = compute_monthly_payroll(
                &employee(1, "Ana"),
                Some(&contract(1, 4_000_000.0)),
                &full_month(1),
                2024,
                3,
                &policy(hours),
            )
            .unwrap_err();
            assert_eq!(err.kind(), "invalid_configuration", "hours = {hours}");
        }
    }

    #[test]
    fn missing_contract_pays_zero() {
        let line =
            compute_monthly_payroll(&employee(1, "Ana"), None, &full_month(1), 2024, 3, &policy(160.0))
                .unwrap();

        assert_eq!(line.base_salary, 0.0);
        assert_eq!(line.gross_pay, 0.0);
        assert_eq!(line.total_hours, 160.0);
    }

    #[test]
    fn negative_salary_is_a_validation_error() {
        let err = compute_monthly_payroll(
            &employee(1, "Ana"),
            Some(&contract(1, -1.0)),
            &[],
            2024,
            3,
            &policy(160.0),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn records_of_another_employee_are_rejected() {
        let err = compute_monthly_payroll(
            &employee(1, "Ana"),
            None,
            &full_month(2),
            2024,
            3,
            &policy(160.0),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn deductions_never_exceed_gross() {
        let records = vec![
            worked(1, 1, 1, 2.0, AttendanceStatus::Late, 90),
            worked(2, 1, 2, 0.0, AttendanceStatus::Absent, 0),
        ];
        let harsh = PayrollPolicy {
            standard_month_hours: 160.0,
            late_penalty_per_minute: 10_000.0,
            absence_penalty: 1_000_000.0,
        };

        let line = compute_monthly_payroll(
            &employee(1, "Ana"),
            Some(&contract(1, 1_600_000.0)),
            &records,
            2024,
            3,
            &harsh,
        )
        .unwrap();

        assert_eq!(line.gross_pay, 20_000.0);
        assert_eq!(line.deductions, 20_000.0);
        assert_eq!(line.net_pay, 0.0);
        assert_eq!(line.late_minutes, 90);
        assert_eq!(line.absence_count, 1);
    }

    #[test]
    fn penalties_are_subtracted_from_gross() {
        let records = vec![worked(1, 1, 1, 8.0, AttendanceStatus::Late, 10)];
        let policy = PayrollPolicy {
            standard_month_hours: 160.0,
            late_penalty_per_minute: 100.0,
            absence_penalty: 0.0,
        };

        let line = compute_monthly_payroll(
            &employee(1, "Ana"),
            Some(&contract(1, 4_000_000.0)),
            &records,
            2024,
            3,
            &policy,
        )
        .unwrap();

        assert_eq!(line.gross_pay, 200_000.0);
        assert_eq!(line.deductions, 1_000.0);
        assert_eq!(line.net_pay, 199_000.0);
    }

    #[test]
    fn batch_covers_whole_roster_sorted_by_name() {
        let roster = vec![employee(2, "Zed"), employee(1, "Ana"), employee(3, "Moe")];
        let contracts: HashMap<u64, Contract> =
            [(1, contract(1, 4_000_000.0)), (2, contract(2, 3_200_000.0))].into();
        let mut records = full_month(1);
        records.push(worked(100, 2, 1, 8.0, AttendanceStatus::OnTime, 0));
        records.push(worked(101, 99, 1, 8.0, AttendanceStatus::OnTime, 0));

        let lines =
            compute_payroll_batch(&roster, &contracts, &records, 2024, 3, &policy(160.0)).unwrap();

        let summary: Vec<_> = lines
            .iter()
            .map(|l| (l.employee_name.as_str(), l.total_hours, l.gross_pay))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Ana", 160.0, 4_000_000.0),
                ("Moe", 0.0, 0.0),
                ("Zed", 8.0, 160_000.0),
            ]
        );
    }

    #[test]
    fn export_has_stable_header_and_unrounded_values() {
        let line = PayrollLine {
            employee_id: 1,
            employee_name: "Doe, \"JD\" John".into(),
            year: 2024,
            month: 3,
            base_salary: 1_000_000.0,
            total_hours: 7.333333333333333,
            hourly_rate: 6250.0,
            gross_pay: 45833.33333333333,
            late_count: 0,
            late_minutes: 0,
            absence_count: 0,
            deductions: 0.0,
            net_pay: 45833.33333333333,
        };

        let csv = String::from_utf8(export_monthly_payroll(&[line])).unwrap();
        let mut rows = csv.split("\r\n");

        assert_eq!(
            rows.next().unwrap(),
            "employee_id,employee_name,year,month,base_salary,total_hours,hourly_rate,gross_pay,late_count,late_minutes,absence_count,deductions,net_pay"
        );
        assert_eq!(
            rows.next().unwrap(),
            "1,\"Doe, \"\"JD\"\" John\",2024,3,1000000,7.333333333333333,6250,45833.33333333333,0,0,0,0,45833.33333333333"
        );
        assert_eq!(rows.next(), Some(""));
    }

    #[test]
    fn export_of_nothing_is_just_the_header() {
        let csv = String::from_utf8(export_monthly_payroll(&[])).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    proptest! {
        #[test]
        fn rate_and_gross_follow_the_formula(
            salary in 0.0f64..50_000_000.0,
            standard in 1.0f64..400.0,
            hours in prop::collection::vec(0.0f64..12.0, 0..28),
        ) {
            let records: Vec<_> = hours
                .iter()
                .enumerate()
                .map(|(i, h)| worked(i as u64 + 1, 1, i as u32 + 1, *h, AttendanceStatus::OnTime, 0))
                .collect();

            let line = compute_monthly_payroll(
                &employee(1, "Ana"),
                Some(&contract(1, salary)),
                &records,
                2024,
                3,
                &policy(standard),
            )
            .unwrap();

            prop_assert_eq!(line.hourly_rate, salary / standard);
            prop_assert_eq!(line.gross_pay, line.hourly_rate * line.total_hours);
            prop_assert!(line.net_pay <= line.gross_pay);
            prop_assert!(line.hourly_rate.is_finite());
        }
    }
}
