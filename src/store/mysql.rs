use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySqlPool};

use super::{AttendanceStore, StoreError};
use crate::model::attendance::{AttendanceRecord, NewAttendanceRecord};
use crate::model::identity::UserId;

/// MySQL "duplicate key" SQLSTATE.
const DUPLICATE_KEY: &str = "23000";

#[derive(FromRow)]
struct RecordRow {
    id: u64,
    user_id: String,
    recorded_at: DateTime<Utc>,
    date: NaiveDate,
    time: String,
    latitude: f64,
    longitude: f64,
    distance_to_store: f64,
    status: String,
    reason: Option<String>,
}

impl TryFrom<RecordRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let user_id = row
            .user_id
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("record {}: bad user id: {e}", row.id)))?;
        let status = row
            .status
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("record {}: bad status {:?}", row.id, row.status)))?;

        Ok(AttendanceRecord {
            id: row.id,
            user_id,
            timestamp: row.recorded_at,
            date: row.date,
            time: row.time,
            latitude: row.latitude,
            longitude: row.longitude,
            distance_to_store: row.distance_to_store,
            status,
            reason: row.reason,
        })
    }
}

const SELECT_RECORD: &str = r#"
    SELECT id, user_id, recorded_at, date, time, latitude, longitude,
           distance_to_store, status, reason
    FROM attendance_records
"#;

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn convert(rows: Vec<RecordRow>) -> Result<Vec<AttendanceRecord>, StoreError> {
        rows.into_iter().map(AttendanceRecord::try_from).collect()
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn records_on(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "{SELECT_RECORD} WHERE user_id = ? AND date = ? ORDER BY recorded_at ASC"
        ))
        .bind(user.to_string())
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Self::convert(rows)
    }

    async fn success_on(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "{SELECT_RECORD} WHERE user_id = ? AND succeeded_on = ? LIMIT 1"
        ))
        .bind(user.to_string())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn records_between(
        &self,
        user: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "{SELECT_RECORD} WHERE user_id = ? AND date BETWEEN ? AND ? ORDER BY recorded_at DESC"
        ))
        .bind(user.to_string())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Self::convert(rows)
    }

    async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
                (user_id, recorded_at, date, time, latitude, longitude,
                 distance_to_store, status, reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.user_id.to_string())
        .bind(record.timestamp)
        .bind(record.date)
        .bind(&record.time)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(record.distance_to_store)
        .bind(record.status.as_ref())
        .bind(&record.reason)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(record.into_record(done.last_insert_id())),
            Err(e) => {
                // the unique key on (user_id, succeeded_on) rejects a second success
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some(DUPLICATE_KEY) {
                        return Err(StoreError::DuplicateSuccess {
                            user: record.user_id,
                            date: record.date,
                        });
                    }
                }
                Err(e.into())
            }
        }
    }

    async fn users(&self) -> Result<Vec<UserId>, StoreError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT user_id FROM attendance_records ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await?;

        ids.into_iter()
            .map(|id| {
                id.parse()
                    .map_err(|e| StoreError::Corrupt(format!("bad user id {id:?}: {e}")))
            })
            .collect()
    }
}
