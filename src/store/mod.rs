//! Record store: an append-only, per-identity collection of attendance records.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::attendance::{AttendanceRecord, NewAttendanceRecord};
use crate::model::identity::UserId;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The conditional write refused a second success for the same day.
    #[error("user {user} already has a successful check-in on {date}")]
    DuplicateSuccess { user: UserId, date: NaiveDate },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored record is malformed: {0}")]
    Corrupt(String),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_duplicate_success(&self) -> bool {
        matches!(self, Self::DuplicateSuccess { .. })
    }
}

/// Backing store for attendance records. Records are never updated or deleted.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// All records for `user` on `date`, oldest first.
    async fn records_on(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// The successful record for `user` on `date`, if any.
    async fn success_on(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Records with `from <= date <= to`, newest first.
    async fn records_between(
        &self,
        user: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// Appends a record.
    ///
    /// A `Succeeded` record is a conditional write keyed on (user, date): when
    /// one already exists the call fails with [`StoreError::DuplicateSuccess`]
    /// and nothing is written.
    async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError>;

    /// Identities that own at least one record.
    async fn users(&self) -> Result<Vec<UserId>, StoreError>;
}
