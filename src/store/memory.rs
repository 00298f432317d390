//! In-process `CorrectionStore` used by the workflow tests.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use chrono::{NaiveDate, NaiveTime};

use crate::{
    error::{AppError, AppResult},
    model::{
        attendance::AttendanceTimes,
        correction::{CorrectionRequest, NewCorrection, RequestStatus, Resolution},
        page::{PageRequest, Paginated},
        shift::Shift,
    },
    service::{
        correction::{CorrectionFilter, CorrectionStore},
        timekeeping::merge_correction,
    },
};

type AttendanceKey = (u64, u64, NaiveDate);

#[derive(Default)]
struct State {
    requests: Vec<CorrectionRequest>,
    attendance: HashMap<AttendanceKey, AttendanceTimes>,
    shifts: HashMap<u64, Shift>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Store knowing a single 08:00-17:00 shift with five minutes of grace.
    pub fn with_morning_shift(shift_id: u64) -> Self {
        let store = Self::default();
        store.lock().shifts.insert(
            shift_id,
            Shift {
                id: shift_id,
                name: "Morning".into(),
                start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                late_grace_minutes: 5,
            },
        );
        store
    }

    pub fn attendance(&self, employee_id: u64, shift_id: u64, date: NaiveDate) -> Option<AttendanceTimes> {
        self.lock()
            .attendance
            .get(&(employee_id, shift_id, date))
            .cloned()
    }

    pub fn put_attendance(&self, employee_id: u64, shift_id: u64, date: NaiveDate, times: AttendanceTimes) {
        self.lock()
            .attendance
            .insert((employee_id, shift_id, date), times);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl CorrectionStore for MemoryStore {
    async fn shift_exists(&self, shift_id: u64) -> AppResult<bool> {
        Ok(self.lock().shifts.contains_key(&shift_id))
    }

    async fn insert(&self, new: NewCorrection) -> AppResult<CorrectionRequest> {
        let mut state = self.lock();
        let request = CorrectionRequest {
            id: state.requests.len() as u64 + 1,
            employee_id: new.employee_id,
            shift_id: new.shift_id,
            date: new.date,
            request_type: new.request_type,
            new_check_in: new.new_check_in,
            new_check_out: new.new_check_out,
            reason: new.reason,
            status: RequestStatus::Pending,
            reviewer_id: None,
            reviewer_notes: None,
            created_at: new.created_at,
            reviewed_at: None,
        };
        state.requests.push(request.clone());
        Ok(request)
    }

    async fn find(&self, id: u64) -> AppResult<Option<CorrectionRequest>> {
        Ok(self.lock().requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list(
        &self,
        filter: &CorrectionFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<CorrectionRequest>> {
        let state = self.lock();
        let mut matching: Vec<_> = state
            .requests
            .iter()
            .filter(|r| filter.employee_id.is_none_or(|id| r.employee_id == id))
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .collect();
        Ok(Paginated::new(data, page, total))
    }

    async fn resolve_pending(
        &self,
        request: &CorrectionRequest,
        resolution: &Resolution,
    ) -> AppResult<bool> {
        let mut state = self.lock();

        let shift = if resolution.status == RequestStatus::Approved
            && request.request_type.edits_time()
        {
            let shift = state
                .shifts
                .get(&request.shift_id)
                .cloned()
                .ok_or_else(|| AppError::not_found(format!("shift {}", request.shift_id)))?;
            Some(shift)
        } else {
            None
        };

        let Some(stored) = state.requests.iter_mut().find(|r| r.id == request.id) else {
            return Ok(false);
        };
        if stored.status != RequestStatus::Pending {
            return Ok(false);
        }
        stored.status = resolution.status;
        stored.reviewer_id = Some(resolution.reviewer_id);
        stored.reviewer_notes = resolution.notes.clone();
        stored.reviewed_at = Some(resolution.reviewed_at);

        if let Some(shift) = shift {
            let key = (request.employee_id, request.shift_id, request.date);
            let merged = merge_correction(state.attendance.get(&key), request, &shift);
            state.attendance.insert(key, merged);
        }

        Ok(true)
    }
}
