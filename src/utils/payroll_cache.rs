use moka::future::Cache;
use std::{sync::Arc, time::Duration};

use crate::service::payroll::PayrollLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayrollKey {
    pub year: i32,
    pub month: u32,
    pub department_id: Option<u64>,
}

/// Computed payroll batches keyed by period and department.
///
/// Any write that can change hours, penalties or the roster must call
/// `invalidate_all`: attendance writes, approved corrections, contract
/// changes and employee create/update/delete.
#[derive(Clone)]
pub struct PayrollCache {
    inner: Cache<PayrollKey, Arc<Vec<PayrollLine>>>,
}

impl PayrollCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &PayrollKey) -> Option<Arc<Vec<PayrollLine>>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: PayrollKey, lines: Vec<PayrollLine>) -> Arc<Vec<PayrollLine>> {
        let lines = Arc::new(lines);
        self.inner.insert(key, Arc::clone(&lines)).await;
        lines
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}
