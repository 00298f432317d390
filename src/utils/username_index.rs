use anyhow::{anyhow, Result};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use moka::future::Cache;
use sqlx::MySqlPool;
use std::{
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::error::AppResult;

/// Expected capacity and false-positive rate.
/// Tune these based on real user counts.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

#[inline]
fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Two-tier username availability check used when creating accounts.
///
/// The cuckoo filter answers "definitely free" without touching the database;
/// the moka cache holds names known to be taken. Only a filter hit that the
/// cache cannot confirm falls through to MySQL.
pub struct UsernameIndex {
    filter: RwLock<CuckooFilter<String>>,
    taken: Cache<String, bool>,
}

impl Default for UsernameIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl UsernameIndex {
    pub fn new() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
            taken: Cache::builder()
                .max_capacity(500_000)
                .time_to_live(Duration::from_secs(86400))
                .build(),
        }
    }

    /// False positives possible, false negatives not.
    pub fn might_exist(&self, username: &str) -> bool {
        let username = normalize(username);
        self.filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&username)
    }

    pub async fn mark_taken(&self, username: &str) {
        let username = normalize(username);
        self.filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(&username);
        self.taken.insert(username, true).await;
    }

    pub async fn is_available(&self, username: &str, pool: &MySqlPool) -> AppResult<bool> {
        if !self.might_exist(username) {
            return Ok(true);
        }

        let username = normalize(username);
        if self.taken.get(&username).await.unwrap_or(false) {
            return Ok(false);
        }

        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = ?)",
        )
        .bind(&username)
        .fetch_one(pool)
        .await?;

        if exists != 0 {
            self.taken.insert(username, true).await;
        }
        Ok(exists == 0)
    }

    /// Loads every username into the filter, streaming in batches.
    pub async fn warmup_filter(&self, pool: &MySqlPool, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String,)>("SELECT username FROM users").fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (username,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

            batch.push(normalize(&username));
            total += 1;

            if batch.len() == batch_size {
                self.add_batch(&batch);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.add_batch(&batch);
        }

        log::info!("Username filter warmup complete: {} users", total);
        Ok(())
    }

    /// Loads only recently active usernames into the taken cache.
    pub async fn warmup_recent(&self, pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT username
            FROM users
            WHERE last_login_at >= NOW() - INTERVAL ? DAY
            ORDER BY last_login_at DESC
            "#,
        )
        .bind(days)
        .fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (username,) = row?;
            batch.push(normalize(&username));
            total += 1;

            if batch.len() >= batch_size {
                self.cache_batch(&batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.cache_batch(&batch).await;
        }

        log::info!(
            "Username cache warmup complete: {} recent users (last {} days)",
            total,
            days
        );
        Ok(())
    }

    fn add_batch(&self, usernames: &[String]) {
        let mut filter = self.filter.write().unwrap_or_else(PoisonError::into_inner);
        for username in usernames {
            filter.add(username);
        }
    }

    async fn cache_batch(&self, usernames: &[String]) {
        let inserts: Vec<_> = usernames
            .iter()
            .map(|u| self.taken.insert(u.clone(), true))
            .collect();
        futures::future::join_all(inserts).await;
    }
}
