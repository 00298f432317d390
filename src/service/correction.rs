//! Attendance-correction workflow.
//!
//! A request starts `pending` and is resolved exactly once, to `approved` or
//! `rejected`. The transition is a compare-and-set performed by the store, so
//! two reviewers racing on the same request cannot both win.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    model::{
        correction::{CorrectionRequest, NewCorrection, RequestStatus, RequestType, Resolution},
        page::{PageRequest, Paginated},
    },
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CorrectionSubmission {
    #[schema(example = 1)]
    pub shift_id: u64,
    #[schema(example = "2024-03-01", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub request_type: RequestType,
    #[schema(example = "2024-03-01T08:02:00", value_type = Option<String>, format = "date-time")]
    pub new_check_in: Option<NaiveDateTime>,
    #[schema(example = "2024-03-01T17:00:00", value_type = Option<String>, format = "date-time")]
    pub new_check_out: Option<NaiveDateTime>,
    #[schema(example = "Badge reader was offline")]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionFilter {
    pub employee_id: Option<u64>,
    pub status: Option<RequestStatus>,
}

/// Persistence seam for correction requests.
///
/// `resolve_pending` must write the resolution only if the stored status is
/// still `pending`, and for an approved time edit must apply the change to the
/// target attendance row in the same atomic step. It returns `false` when the
/// request was no longer pending.
#[allow(async_fn_in_trait)]
pub trait CorrectionStore {
    async fn shift_exists(&self, shift_id: u64) -> AppResult<bool>;

    async fn insert(&self, new: NewCorrection) -> AppResult<CorrectionRequest>;

    async fn find(&self, id: u64) -> AppResult<Option<CorrectionRequest>>;

    async fn list(
        &self,
        filter: &CorrectionFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<CorrectionRequest>>;

    async fn resolve_pending(
        &self,
        request: &CorrectionRequest,
        resolution: &Resolution,
    ) -> AppResult<bool>;
}

pub fn validate_submission(
    employee_id: u64,
    submission: CorrectionSubmission,
    now: NaiveDateTime,
) -> AppResult<NewCorrection> {
    let reason = submission.reason.trim();
    if reason.is_empty() {
        return Err(AppError::validation("reason must not be empty"));
    }

    let (check_in, check_out) = (submission.new_check_in, submission.new_check_out);
    match submission.request_type {
        RequestType::ForgotCheckin if check_in.is_none() => {
            return Err(AppError::validation("forgot_checkin requires new_check_in"));
        }
        RequestType::ForgotCheckout if check_out.is_none() => {
            return Err(AppError::validation("forgot_checkout requires new_check_out"));
        }
        RequestType::EditTime if check_in.is_none() && check_out.is_none() => {
            return Err(AppError::validation(
                "edit_time requires new_check_in or new_check_out",
            ));
        }
        RequestType::Leave if check_in.is_some() || check_out.is_some() => {
            return Err(AppError::validation("leave must not carry proposed times"));
        }
        _ => {}
    }

    if let Some(at) = check_in {
        if at.date() != submission.date {
            return Err(AppError::validation(format!(
                "new_check_in {at} is not on {}",
                submission.date
            )));
        }
    }
    if let Some(at) = check_out {
        // Overnight shifts end the day after they start.
        let latest = submission.date.succ_opt().unwrap_or(submission.date);
        if at.date() < submission.date || at.date() > latest {
            return Err(AppError::validation(format!(
                "new_check_out {at} is not on {} or the day after",
                submission.date
            )));
        }
    }
    if let (Some(start), Some(end)) = (check_in, check_out) {
        if end <= start {
            return Err(AppError::validation(
                "new_check_out must be after new_check_in",
            ));
        }
    }

    Ok(NewCorrection {
        employee_id,
        shift_id: submission.shift_id,
        date: submission.date,
        request_type: submission.request_type,
        new_check_in: check_in,
        new_check_out: check_out,
        reason: reason.to_string(),
        created_at: now,
    })
}

pub async fn submit<S: CorrectionStore>(
    store: &S,
    employee_id: u64,
    submission: CorrectionSubmission,
    now: NaiveDateTime,
) -> AppResult<CorrectionRequest> {
    let new = validate_submission(employee_id, submission, now)?;
    // An unknown shift could never be approved, so refuse it up front.
    if !store.shift_exists(new.shift_id).await? {
        return Err(AppError::not_found(format!("shift {}", new.shift_id)));
    }
    let created = store.insert(new).await?;
    info!(
        request_id = created.id,
        employee_id,
        request_type = %created.request_type,
        "Correction request submitted"
    );
    Ok(created)
}

pub async fn approve<S: CorrectionStore>(
    store: &S,
    request_id: u64,
    reviewer_id: u64,
    notes: Option<String>,
    now: NaiveDateTime,
) -> AppResult<CorrectionRequest> {
    resolve(store, request_id, RequestStatus::Approved, reviewer_id, notes, now).await
}

pub async fn reject<S: CorrectionStore>(
    store: &S,
    request_id: u64,
    reviewer_id: u64,
    notes: Option<String>,
    now: NaiveDateTime,
) -> AppResult<CorrectionRequest> {
    resolve(store, request_id, RequestStatus::Rejected, reviewer_id, notes, now).await
}

async fn resolve<S: CorrectionStore>(
    store: &S,
    request_id: u64,
    status: RequestStatus,
    reviewer_id: u64,
    notes: Option<String>,
    now: NaiveDateTime,
) -> AppResult<CorrectionRequest> {
    let request = store
        .find(request_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("correction request {request_id}")))?;

    if request.status != RequestStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "correction request {request_id} is already {}",
            request.status
        )));
    }

    let resolution = Resolution {
        status,
        reviewer_id,
        notes: notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        reviewed_at: now,
    };

    if !store.resolve_pending(&request, &resolution).await? {
        return Err(AppError::InvalidState(format!(
            "correction request {request_id} was resolved by another reviewer"
        )));
    }

    info!(request_id, reviewer_id, status = %status, "Correction request resolved");

    Ok(CorrectionRequest {
        status,
        reviewer_id: Some(reviewer_id),
        reviewer_notes: resolution.notes,
        reviewed_at: Some(now),
        ..request
    })
}

pub async fn get<S: CorrectionStore>(store: &S, request_id: u64) -> AppResult<CorrectionRequest> {
    store
        .find(request_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("correction request {request_id}")))
}

pub async fn list_mine<S: CorrectionStore>(
    store: &S,
    employee_id: u64,
    status: Option<RequestStatus>,
    page: PageRequest,
) -> AppResult<Paginated<CorrectionRequest>> {
    let filter = CorrectionFilter {
        employee_id: Some(employee_id),
        status,
    };
    store.list(&filter, page).await
}

pub async fn list_pending<S: CorrectionStore>(
    store: &S,
    page: PageRequest,
) -> AppResult<Paginated<CorrectionRequest>> {
    let filter = CorrectionFilter {
        employee_id: None,
        status: Some(RequestStatus::Pending),
    };
    store.list(&filter, page).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::attendance::{AttendanceStatus, AttendanceTimes},
        store::memory::MemoryStore,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, 0).unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn submission(
        kind: RequestType,
        check_in: Option<NaiveDateTime>,
        check_out: Option<NaiveDateTime>,
    ) -> CorrectionSubmission {
        CorrectionSubmission {
            shift_id: 1,
            date: day(),
            request_type: kind,
            new_check_in: check_in,
            new_check_out: check_out,
            reason: "Badge reader was offline".into(),
        }
    }

    #[test]
    fn blank_reason_is_rejected() {
        let mut s = submission(RequestType::ForgotCheckin, Some(at(8, 0)), None);
        s.reason = "   ".into();
        assert_eq!(
            validate_submission(7, s, now()).unwrap_err().kind(),
            "validation_error"
        );
    }

    #[test]
    fn leave_with_proposed_time_is_rejected() {
        let s = submission(RequestType::Leave, Some(at(8, 0)), None);
        assert_eq!(
            validate_submission(7, s, now()).unwrap_err().kind(),
            "validation_error"
        );
    }

    #[test]
    fn time_types_require_their_timestamps() {
        let cases = [
            submission(RequestType::ForgotCheckin, None, Some(at(17, 0))),
            submission(RequestType::ForgotCheckout, Some(at(8, 0)), None),
            submission(RequestType::EditTime, None, None),
        ];
        for s in cases {
            let kind = s.request_type;
            assert!(validate_submission(7, s, now()).is_err(), "{kind} accepted");
        }
    }

    #[test]
    fn check_out_must_follow_check_in() {
        let s = submission(RequestType::EditTime, Some(at(17, 0)), Some(at(8, 0)));
        assert!(validate_submission(7, s, now()).is_err());
    }

    #[test]
    fn check_in_must_fall_on_target_date() {
        let next_day = day().succ_opt().unwrap().and_hms_opt(8, 0, 0).unwrap();
        let s = submission(RequestType::ForgotCheckin, Some(next_day), None);
        assert!(validate_submission(7, s, now()).is_err());
    }

    #[test]
    fn check_out_must_end_by_the_next_day() {
        let overnight = day().succ_opt().unwrap().and_hms_opt(6, 0, 0).unwrap();
        let s = submission(RequestType::ForgotCheckout, None, Some(overnight));
        assert!(validate_submission(7, s, now()).is_ok());

        let years_later = NaiveDate::from_ymd_opt(2027, 3, 1)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap();
        let s = submission(RequestType::ForgotCheckout, None, Some(years_later));
        assert_eq!(
            validate_submission(7, s, now()).unwrap_err().kind(),
            "validation_error"
        );

        let day_before = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap();
        let s = submission(RequestType::EditTime, None, Some(day_before));
        assert!(validate_submission(7, s, now()).is_err());
    }

    #[test]
    fn valid_submission_trims_reason() {
        let mut s = submission(RequestType::Leave, None, None);
        s.reason = "  family event ".into();

        let new = validate_submission(7, s, now()).unwrap();
        assert_eq!(new.reason, "family event");
        assert_eq!(new.employee_id, 7);
        assert_eq!(new.created_at, now());
    }

    #[actix_web::test]
    async fn approve_applies_the_change_to_attendance() {
        let store = MemoryStore::with_morning_shift(1);
        let request = submit(
            &store,
            7,
            submission(RequestType::ForgotCheckin, Some(at(8, 20)), None),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(request.status, RequestStatus::Pending);

        let approved = approve(&store, request.id, 99, Some(" ok ".into()), now())
            .await
            .unwrap();

        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.reviewer_id, Some(99));
        assert_eq!(approved.reviewer_notes.as_deref(), Some("ok"));
        assert_eq!(approved.reviewed_at, Some(now()));
        assert_eq!(store.find(request.id).await.unwrap(), Some(approved));

        let record = store.attendance(7, 1, day()).unwrap();
        assert_eq!(record.check_in, Some(at(8, 20)));
        assert_eq!(record.status, AttendanceStatus::Late);
        assert_eq!(record.late_minutes, 20);
    }

    #[actix_web::test]
    async fn reject_leaves_attendance_untouched() {
        let store = MemoryStore::with_morning_shift(1);
        let request = submit(
            &store,
            7,
            submission(RequestType::ForgotCheckin, Some(at(8, 0)), None),
            now(),
        )
        .await
        .unwrap();

        let rejected = reject(&store, request.id, 99, None, now()).await.unwrap();

        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.reviewer_notes, None);
        assert!(store.attendance(7, 1, day()).is_none());
    }

    #[actix_web::test]
    async fn approving_a_rejected_request_is_invalid_state() {
        let store = MemoryStore::with_morning_shift(1);
        let existing = AttendanceTimes {
            check_in: Some(at(8, 30)),
            check_out: None,
            work_hours: 0.0,
            status: AttendanceStatus::Late,
            late_minutes: 30,
        };
        store.put_attendance(7, 1, day(), existing.clone());

        let request = submit(
            &store,
            7,
            submission(RequestType::EditTime, Some(at(8, 0)), Some(at(17, 0))),
            now(),
        )
        .await
        .unwrap();
        reject(&store, request.id, 99, None, now()).await.unwrap();

        let err = approve(&store, request.id, 98, None, now()).await.unwrap_err();

        assert_eq!(err.kind(), "invalid_state");
        assert_eq!(store.attendance(7, 1, day()), Some(existing));
        assert_eq!(
            store.find(request.id).await.unwrap().unwrap().status,
            RequestStatus::Rejected
        );
    }

    #[actix_web::test]
    async fn resolving_unknown_request_is_not_found() {
        let store = MemoryStore::with_morning_shift(1);
        let err = approve(&store, 404, 1, None, now()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[actix_web::test]
    async fn stale_snapshot_loses_the_compare_and_set() {
        let store = MemoryStore::with_morning_shift(1);
        let request = submit(
            &store,
            7,
            submission(RequestType::ForgotCheckin, Some(at(8, 0)), None),
            now(),
        )
        .await
        .unwrap();

        // Both reviewers loaded the request while it was pending.
        let approve_first = Resolution {
            status: RequestStatus::Approved,
            reviewer_id: 1,
            notes: None,
            reviewed_at: now(),
        };
        let reject_second = Resolution {
            status: RequestStatus::Rejected,
            reviewer_id: 2,
            notes: None,
            reviewed_at: now(),
        };

        assert!(store.resolve_pending(&request, &approve_first).await.unwrap());
        assert!(!store.resolve_pending(&request, &reject_second).await.unwrap());

        let stored = store.find(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.reviewer_id, Some(1));
    }

    #[test]
    fn concurrent_approve_and_reject_have_one_winner() {
        for _ in 0..50 {
            let store = Arc::new(MemoryStore::with_morning_shift(1));
            let request = futures::executor::block_on(submit(
                store.as_ref(),
                7,
                submission(RequestType::ForgotCheckin, Some(at(8, 0)), None),
                now(),
            ))
            .unwrap();

            let approver = {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    futures::executor::block_on(approve(store.as_ref(), request.id, 1, None, now()))
                })
            };
            let rejecter = {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    futures::executor::block_on(reject(store.as_ref(), request.id, 2, None, now()))
                })
            };

            let approved = approver.join().unwrap();
            let rejected = rejecter.join().unwrap();

            assert!(approved.is_ok() != rejected.is_ok());
            let loser = if approved.is_ok() { &rejected } else { &approved };
            assert_eq!(loser.as_ref().unwrap_err().kind(), "invalid_state");
            assert_eq!(store.attendance(7, 1, day()).is_some(), approved.is_ok());
        }
    }

    #[actix_web::test]
    async fn listing_is_filtered_ordered_and_repeatable() {
        let store = MemoryStore::with_morning_shift(1);
        let mut ids = Vec::new();
        for (employee, minute) in [(7, 1), (8, 2), (7, 3)] {
            let request = submit(
                &store,
                employee,
                submission(RequestType::ForgotCheckin, Some(at(8, minute)), None),
                now(),
            )
            .await
            .unwrap();
            ids.push(request.id);
        }
        reject(&store, ids[0], 99, None, now()).await.unwrap();

        let page = PageRequest::new(None, None);
        let mine = list_mine(&store, 7, None, page).await.unwrap();
        assert_eq!(mine.total, 2);
        assert_eq!(
            mine.data.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![ids[2], ids[0]]
        );

        let pending = list_pending(&store, page).await.unwrap();
        assert_eq!(
            pending.data.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![ids[2], ids[1]]
        );
        assert_eq!(list_pending(&store, page).await.unwrap(), pending);

        let rejected_only = list_mine(&store, 7, Some(RequestStatus::Rejected), page)
            .await
            .unwrap();
        assert_eq!(rejected_only.data.len(), 1);

        let second_page = list_pending(&store, PageRequest::new(Some(2), Some(1)))
            .await
            .unwrap();
        assert_eq!(second_page.total, 2);
        assert_eq!(second_page.data[0].id, ids[1]);
    }

    #[actix_web::test]
    async fn submitting_for_an_unknown_shift_is_not_found() {
        let store = MemoryStore::with_morning_shift(1);
        let mut s = submission(RequestType::ForgotCheckin, Some(at(8, 0)), None);
        s.shift_id = 42;

        let err = submit(&store, 7, s, now()).await.unwrap_err();

        assert_eq!(err.kind(), "not_found");
        let page = list_mine(&store, 7, None, PageRequest::new(None, None))
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[actix_web::test]
    async fn approved_leave_does_not_touch_attendance() {
        let store = MemoryStore::with_morning_shift(1);
        let request = submit(&store, 7, submission(RequestType::Leave, None, None), now())
            .await
            .unwrap();

        let approved = approve(&store, request.id, 99, None, now()).await.unwrap();

        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(store.attendance(7, 1, day()).is_none());
    }
}
