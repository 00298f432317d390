use crate::api::attendance::{AbsenceSweepReq, CheckInResponse, ClockReq};
use crate::api::contract::ContractReq;
use crate::api::correction::ReviewReq;
use crate::api::department::DepartmentReq;
use crate::api::employee::{CreateEmployee, EmployeeListResponse};
use crate::api::position::PositionReq;
use crate::api::shift::ShiftReq;
use crate::api::users::{ActiveReq, CreateUserReq, RoleReq};
use crate::auth::handlers::MeResponse;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::contract::Contract;
use crate::model::correction::{CorrectionRequest, RequestStatus, RequestType};
use crate::model::department::Department;
use crate::model::employee::Employee;
use crate::model::page::CorrectionPage;
use crate::model::position::Position;
use crate::model::shift::Shift;
use crate::model::user::User;
use crate::models::{LoginReqDto, TokenPair};
use crate::service::aggregation::EmployeeDayGroup;
use crate::service::correction::CorrectionSubmission;
use crate::service::payroll::PayrollLine;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Attendance & Payroll API",
        version = "1.0.0",
        description = r#"
## Attendance, payroll and correction workflow

### Key Features
- **Attendance**
  - Shift-aware check-in/check-out with lateness evaluation
  - Daily and monthly per-employee views, absence sweep
- **Corrections**
  - Employees file forgot-check-in/out, time edits and leave
  - HR/Admin approve or reject; approval rewrites the attendance row atomically
- **Payroll**
  - Monthly pay from contract salary and worked hours, CSV export
- **Directory**
  - Employees, departments, positions, shifts, contracts and user accounts

### Security
Endpoints under `/api` require a **JWT Bearer** access token from `/auth/login`.
Roles are **ADMIN**, **HR** and **STAFF**; staff only see their own data.

### Errors
Every error body is `{"error": "<kind>", "message": "<text>"}`.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::me,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::mark_absences,
        crate::api::attendance::daily_report,
        crate::api::attendance::monthly_report,

        crate::api::correction::submit_correction,
        crate::api::correction::list_my_corrections,
        crate::api::correction::list_pending_corrections,
        crate::api::correction::get_correction,
        crate::api::correction::approve_correction,
        crate::api::correction::reject_correction,

        crate::api::payroll::monthly_payroll,
        crate::api::payroll::export_payroll,
        crate::api::payroll::employee_payroll,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::contract::create_contract,
        crate::api::contract::list_contracts,
        crate::api::contract::update_contract,

        crate::api::department::create_department,
        crate::api::department::list_departments,
        crate::api::department::update_department,

        crate::api::position::create_position,
        crate::api::position::list_positions,

        crate::api::shift::create_shift,
        crate::api::shift::list_shifts,
        crate::api::shift::get_shift,

        crate::api::users::create_user,
        crate::api::users::list_users,
        crate::api::users::change_role,
        crate::api::users::set_active
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            MeResponse,
            ClockReq,
            CheckInResponse,
            AbsenceSweepReq,
            AttendanceRecord,
            AttendanceStatus,
            EmployeeDayGroup,
            CorrectionSubmission,
            CorrectionRequest,
            CorrectionPage,
            RequestType,
            RequestStatus,
            ReviewReq,
            PayrollLine,
            CreateEmployee,
            Employee,
            EmployeeListResponse,
            Contract,
            ContractReq,
            Department,
            DepartmentReq,
            Position,
            PositionReq,
            Shift,
            ShiftReq,
            User,
            CreateUserReq,
            RoleReq,
            ActiveReq
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and session APIs"),
        (name = "Attendance", description = "Attendance capture and reports"),
        (name = "Corrections", description = "Attendance-correction workflow"),
        (name = "Payroll", description = "Monthly payroll and export"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Directory", description = "Departments, positions, shifts and contracts"),
        (name = "Users", description = "Account administration"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_core_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/attendance/check-in",
            "/api/corrections/{id}/approve",
            "/api/payroll/export",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
