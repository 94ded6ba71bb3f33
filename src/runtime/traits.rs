//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::{
    CatalogItem, Database, DbError, Exercise, HistoryEntry, HistoryExportRow, HistoryLine,
    NewHistoryEntry, TodayRecord, User,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a persistence call, as seen by the dialog
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Already exists: {0}")]
    UniquenessViolation(String),
    #[error("Storage unavailable: {0}")]
    Transient(String),
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate(message) => StorageError::UniquenessViolation(message),
            other => StorageError::Transient(other.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persisted chat identities
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_external_id(&self, external_id: i64) -> StorageResult<Option<User>>;

    async fn create_user(&self, external_id: i64, user_name: &str) -> StorageResult<User>;
}

/// Body parts and per-user exercises
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_body_parts(&self) -> StorageResult<Vec<CatalogItem>>;

    async fn find_body_part(&self, id: i64) -> StorageResult<Option<CatalogItem>>;

    async fn list_exercises(&self, user_id: i64, body_part_id: i64)
        -> StorageResult<Vec<CatalogItem>>;

    /// Exercise by id, only if it belongs to the user and body part
    async fn find_exercise(
        &self,
        user_id: i64,
        body_part_id: i64,
        exercise_id: i64,
    ) -> StorageResult<Option<CatalogItem>>;

    async fn create_exercise(
        &self,
        user_id: i64,
        body_part_id: i64,
        name: &str,
    ) -> StorageResult<Exercise>;
}

/// Logged notes
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn create_history_entry(&self, entry: &NewHistoryEntry) -> StorageResult<HistoryEntry>;

    async fn list_recent_history(
        &self,
        user_id: i64,
        exercise_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<HistoryLine>>;

    async fn list_today_history(&self, user_id: i64) -> StorageResult<Vec<TodayRecord>>;

    async fn export_history(&self) -> StorageResult<Vec<HistoryExportRow>>;
}

/// Combined persistence trait for convenience
pub trait Gateway: UserStore + CatalogStore + HistoryStore {}
impl<T: UserStore + CatalogStore + HistoryStore> Gateway for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: UserStore + ?Sized> UserStore for Arc<T> {
    async fn find_user_by_external_id(&self, external_id: i64) -> StorageResult<Option<User>> {
        (**self).find_user_by_external_id(external_id).await
    }

    async fn create_user(&self, external_id: i64, user_name: &str) -> StorageResult<User> {
        (**self).create_user(external_id, user_name).await
    }
}

#[async_trait]
impl<T: CatalogStore + ?Sized> CatalogStore for Arc<T> {
    async fn list_body_parts(&self) -> StorageResult<Vec<CatalogItem>> {
        (**self).list_body_parts().await
    }

    async fn find_body_part(&self, id: i64) -> StorageResult<Option<CatalogItem>> {
        (**self).find_body_part(id).await
    }

    async fn list_exercises(
        &self,
        user_id: i64,
        body_part_id: i64,
    ) -> StorageResult<Vec<CatalogItem>> {
        (**self).list_exercises(user_id, body_part_id).await
    }

    async fn find_exercise(
        &self,
        user_id: i64,
        body_part_id: i64,
        exercise_id: i64,
    ) -> StorageResult<Option<CatalogItem>> {
        (**self)
            .find_exercise(user_id, body_part_id, exercise_id)
            .await
    }

    async fn create_exercise(
        &self,
        user_id: i64,
        body_part_id: i64,
        name: &str,
    ) -> StorageResult<Exercise> {
        (**self).create_exercise(user_id, body_part_id, name).await
    }
}

#[async_trait]
impl<T: HistoryStore + ?Sized> HistoryStore for Arc<T> {
    async fn create_history_entry(&self, entry: &NewHistoryEntry) -> StorageResult<HistoryEntry> {
        (**self).create_history_entry(entry).await
    }

    async fn list_recent_history(
        &self,
        user_id: i64,
        exercise_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<HistoryLine>> {
        (**self).list_recent_history(user_id, exercise_id, limit).await
    }

    async fn list_today_history(&self, user_id: i64) -> StorageResult<Vec<TodayRecord>> {
        (**self).list_today_history(user_id).await
    }

    async fn export_history(&self) -> StorageResult<Vec<HistoryExportRow>> {
        (**self).export_history().await
    }
}

// ============================================================================
// Production Adapter
// ============================================================================

/// Adapter to use Database as the gateway
#[derive(Clone)]
pub struct DatabaseGateway {
    db: Database,
}

impl DatabaseGateway {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[allow(dead_code)] // Useful for tests
    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl UserStore for DatabaseGateway {
    async fn find_user_by_external_id(&self, external_id: i64) -> StorageResult<Option<User>> {
        Ok(self.db.find_user_by_external_id(external_id)?)
    }

    async fn create_user(&self, external_id: i64, user_name: &str) -> StorageResult<User> {
        Ok(self.db.create_user(external_id, user_name)?)
    }
}

#[async_trait]
impl CatalogStore for DatabaseGateway {
    async fn list_body_parts(&self) -> StorageResult<Vec<CatalogItem>> {
        Ok(self.db.list_body_parts()?)
    }

    async fn find_body_part(&self, id: i64) -> StorageResult<Option<CatalogItem>> {
        Ok(self.db.find_body_part(id)?)
    }

    async fn list_exercises(
        &self,
        user_id: i64,
        body_part_id: i64,
    ) -> StorageResult<Vec<CatalogItem>> {
        Ok(self.db.list_exercises(user_id, body_part_id)?)
    }

    async fn find_exercise(
        &self,
        user_id: i64,
        body_part_id: i64,
        exercise_id: i64,
    ) -> StorageResult<Option<CatalogItem>> {
        Ok(self.db.find_exercise(user_id, body_part_id, exercise_id)?)
    }

    async fn create_exercise(
        &self,
        user_id: i64,
        body_part_id: i64,
        name: &str,
    ) -> StorageResult<Exercise> {
        Ok(self.db.create_exercise(user_id, body_part_id, name)?)
    }
}

#[async_trait]
impl HistoryStore for DatabaseGateway {
    async fn create_history_entry(&self, entry: &NewHistoryEntry) -> StorageResult<HistoryEntry> {
        Ok(self.db.create_history_entry(entry)?)
    }

    async fn list_recent_history(
        &self,
        user_id: i64,
        exercise_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<HistoryLine>> {
        Ok(self.db.list_recent_history(user_id, exercise_id, limit)?)
    }

    async fn list_today_history(&self, user_id: i64) -> StorageResult<Vec<TodayRecord>> {
        Ok(self.db.list_today_history(user_id)?)
    }

    async fn export_history(&self) -> StorageResult<Vec<HistoryExportRow>> {
        Ok(self.db.export_history()?)
    }
}
