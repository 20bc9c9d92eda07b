use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{AttendanceStore, StoreError};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, NewAttendanceRecord};
use crate::model::identity::UserId;

/// In-process store used when no database is configured, and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AttendanceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<T>(
        &self,
        f: impl FnOnce(&mut Vec<AttendanceRecord>) -> T,
    ) -> Result<T, StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        Ok(f(&mut records))
    }

    pub fn len(&self) -> usize {
        self.with_records(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn records_on(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.with_records(|records| {
            records
                .iter()
                .filter(|r| r.user_id == *user && r.date == date)
                .cloned()
                .collect()
        })
    }

    async fn success_on(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        self.with_records(|records| {
            records
                .iter()
                .find(|r| r.user_id == *user && r.date == date && r.is_success())
                .cloned()
        })
    }

    async fn records_between(
        &self,
        user: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.with_records(|records| {
            let mut found: Vec<_> = records
                .iter()
                .filter(|r| r.user_id == *user && r.date >= from && r.date <= to)
                .cloned()
                .collect();
            found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            found
        })
    }

    async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        // check and insert under one lock: this is the conditional write
        self.with_records(|records| {
            if record.status == AttendanceStatus::Succeeded
                && records
                    .iter()
                    .any(|r| r.user_id == record.user_id && r.date == record.date && r.is_success())
            {
                return Err(StoreError::DuplicateSuccess {
                    user: record.user_id,
                    date: record.date,
                });
            }
            let stored = record.into_record(records.len() as u64 + 1);
            records.push(stored.clone());
            Ok(stored)
        })?
    }

    async fn users(&self) -> Result<Vec<UserId>, StoreError> {
        self.with_records(|records| {
            records
                .iter()
                .map(|r| r.user_id)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record(user: UserId, day: u32, hour: u32, status: AttendanceStatus) -> NewAttendanceRecord {
        let timestamp = Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap();
        NewAttendanceRecord {
            user_id: user,
            timestamp,
            date: timestamp.date_naive(),
            time: format!("{hour:02}:00:00"),
            latitude: 0.0,
            longitude: 0.0,
            distance_to_store: 0.0,
            status,
            reason: None,
        }
    }

    #[actix_web::test]
    async fn second_success_on_same_day_is_refused() {
        let store = MemoryStore::new();
        let user = UserId::new();
        store.append(record(user, 2, 1, AttendanceStatus::Succeeded)).await.unwrap();
        let err = store
            .append(record(user, 2, 3, AttendanceStatus::Succeeded))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_success());
        assert_eq!(store.len(), 1);
    }

    #[actix_web::test]
    async fn failures_may_repeat_and_other_users_are_independent() {
        let store = MemoryStore::new();
        let alice = UserId::new();
        let bob = UserId::new();
        store.append(record(alice, 2, 1, AttendanceStatus::Failed)).await.unwrap();
        store.append(record(alice, 2, 2, AttendanceStatus::Failed)).await.unwrap();
        store.append(record(alice, 2, 3, AttendanceStatus::Succeeded)).await.unwrap();
        store.append(record(bob, 2, 3, AttendanceStatus::Succeeded)).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(store.records_on(&alice, date).await.unwrap().len(), 3);
        assert_eq!(store.success_on(&alice, date).await.unwrap().unwrap().time, "03:00:00");
        assert_eq!(store.users().await.unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn range_query_is_inclusive_and_newest_first() {
        let store = MemoryStore::new();
        let user = UserId::new();
        for day in [1, 5, 31] {
            store.append(record(user, day, 1, AttendanceStatus::Succeeded)).await.unwrap();
        }
        let mut april = record(user, 31, 1, AttendanceStatus::Failed);
        april.timestamp += Duration::days(1);
        april.date = april.timestamp.date_naive();
        store.append(april).await.unwrap();

        let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let found = store.records_between(&user, from, to).await.unwrap();
        let days: Vec<_> = found.iter().map(|r| r.date.format("%d").to_string()).collect();
        assert_eq!(days, ["31", "05", "01"]);
    }
}
