use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::identity::UserId;

pub const REASON_TOO_FAR: &str = "too far";
pub const REASON_ALREADY_CHECKED_IN: &str = "already checked in";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum AttendanceStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "id": 1,
        "userId": "7b0d2a4e-3f7a-4d55-9a8e-0c1b2d3e4f50",
        "timestamp": "2026-03-02T01:15:42Z",
        "date": "2026-03-02",
        "time": "08:15:42",
        "latitude": -6.533322,
        "longitude": 108.455498,
        "distanceToStore": 3.4,
        "status": "Succeeded",
        "reason": null
    })
)]
pub struct AttendanceRecord {
    pub id: u64,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_to_store: f64,
    pub status: AttendanceStatus,
    #[schema(nullable = true)]
    pub reason: Option<String>,
}

impl AttendanceRecord {
    pub fn is_success(&self) -> bool {
        self.status == AttendanceStatus::Succeeded
    }
}

/// A record before the store assigns it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceRecord {
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_to_store: f64,
    pub status: AttendanceStatus,
    pub reason: Option<String>,
}

impl NewAttendanceRecord {
    pub fn into_record(self, id: u64) -> AttendanceRecord {
        AttendanceRecord {
            id,
            user_id: self.user_id,
            timestamp: self.timestamp,
            date: self.date,
            time: self.time,
            latitude: self.latitude,
            longitude: self.longitude,
            distance_to_store: self.distance_to_store,
            status: self.status,
            reason: self.reason,
        }
    }
}
