//! In-memory ledger for tests.
//!
//! Deletions made through a transaction are staged and only applied on
//! commit, so rollback behaviour can be asserted without Postgres.

use crate::db::pending::{PendingLedger, PendingLedgerTx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_core::{AppError, FileToDelete, PendingRecord};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Key = (String, String);
type Rows = Arc<Mutex<HashMap<Key, DateTime<Utc>>>>;

fn key(filename: &str, category: &str) -> Key {
    (filename.to_string(), category.to_string())
}

fn lock(rows: &Rows) -> MutexGuard<'_, HashMap<Key, DateTime<Utc>>> {
    rows.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct InMemoryPendingLedger {
    rows: Rows,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryPendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent ledger call fail, as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn contains(&self, filename: &str, category: &str) -> bool {
        lock(&self.rows).contains_key(&key(filename, category))
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Internal("ledger unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PendingLedger for InMemoryPendingLedger {
    async fn insert(
        &self,
        filename: &str,
        category: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.check_available()?;
        lock(&self.rows)
            .entry(key(filename, category))
            .or_insert(created_at);
        Ok(())
    }

    async fn get(
        &self,
        filename: &str,
        category: &str,
    ) -> Result<Option<PendingRecord>, AppError> {
        self.check_available()?;
        Ok(lock(&self.rows)
            .get(&key(filename, category))
            .map(|created_at| PendingRecord {
                filename: filename.to_string(),
                category: category.to_string(),
                created_at: *created_at,
            }))
    }

    async fn begin(&self) -> Result<Box<dyn PendingLedgerTx>, AppError> {
        self.check_available()?;
        Ok(Box::new(InMemoryPendingLedgerTx {
            rows: self.rows.clone(),
            staged: HashSet::new(),
        }))
    }
}

struct InMemoryPendingLedgerTx {
    rows: Rows,
    staged: HashSet<Key>,
}

#[async_trait]
impl PendingLedgerTx for InMemoryPendingLedgerTx {
    async fn delete_one(&mut self, filename: &str, category: &str) -> Result<(), AppError> {
        self.staged.insert(key(filename, category));
        Ok(())
    }

    async fn delete_expired_batch(
        &mut self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileToDelete>, AppError> {
        let rows = lock(&self.rows);
        let mut expired: Vec<(&Key, &DateTime<Utc>)> = rows
            .iter()
            .filter(|(k, created_at)| **created_at <= cutoff && !self.staged.contains(*k))
            .collect();
        expired.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));

        let removed: Vec<FileToDelete> = expired
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|((filename, category), _)| FileToDelete {
                filename: filename.clone(),
                category: category.clone(),
            })
            .collect();
        drop(rows);

        for file in &removed {
            self.staged.insert(key(&file.filename, &file.category));
        }
        Ok(removed)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let mut rows = lock(&self.rows);
        for k in &self.staged {
            rows.remove(k);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let ledger = InMemoryPendingLedger::new();
        let first = Utc::now() - Duration::hours(1);
        ledger.insert("f", "c", first).await.unwrap();
        ledger.insert("f", "c", Utc::now()).await.unwrap();

        assert_eq!(ledger.len(), 1);
        let record = ledger.get("f", "c").await.unwrap().unwrap();
        assert_eq!(record.created_at, first);
    }

    #[tokio::test]
    async fn test_expired_batch_is_oldest_first_and_limited() {
        let ledger = InMemoryPendingLedger::new();
        let now = Utc::now();
        for (name, age) in [("new", 1), ("oldest", 30), ("middle", 10), ("fresh", 0)] {
            ledger
                .insert(name, "c", now - Duration::minutes(age))
                .await
                .unwrap();
        }

        let mut tx = ledger.begin().await.unwrap();
        let removed = tx
            .delete_expired_batch(now - Duration::minutes(1), 2)
            .await
            .unwrap();
        let names: Vec<&str> = removed.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["oldest", "middle"]);

        assert_eq!(ledger.len(), 4);
        tx.commit().await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("new", "c"));
        assert!(ledger.contains("fresh", "c"));
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_deletes() {
        let ledger = InMemoryPendingLedger::new();
        ledger.insert("f", "c", Utc::now()).await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        tx.delete_one("f", "c").await.unwrap();
        tx.rollback().await.unwrap();

        assert!(ledger.contains("f", "c"));
    }
}
