use sqlx::MySqlPool;

/// `succeeded_on` is NULL for failed attempts, and MySQL unique keys admit any
/// number of NULLs, so the key allows one success per user and day while
/// failed attempts pile up freely.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS attendance_records (
    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    user_id CHAR(36) NOT NULL,
    recorded_at DATETIME(3) NOT NULL,
    date DATE NOT NULL,
    time VARCHAR(16) NOT NULL,
    latitude DOUBLE NOT NULL,
    longitude DOUBLE NOT NULL,
    distance_to_store DOUBLE NOT NULL,
    status VARCHAR(16) NOT NULL,
    reason VARCHAR(255) NULL,
    succeeded_on DATE AS (IF(status = 'Succeeded', date, NULL)) STORED,
    UNIQUE KEY uq_attendance_success_per_day (user_id, succeeded_on),
    KEY idx_attendance_user_date (user_id, date)
)
"#;

pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    let pool = MySqlPool::connect(database_url).await?;
    sqlx::query(SCHEMA).execute(&pool).await?;
    Ok(pool)
}
