//! Per-concern state values for one device session.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::geo::{Coordinates, Geofence, LocationError, LocationReport, PendingFix, PositionOptions};

/// Attendance state for the current calendar day.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttendanceState {
    #[default]
    NotCheckedIn,
    /// Terminal for the day.
    CheckedIn { time: String },
    /// Non-terminal: a later in-radius attempt may still succeed.
    CheckInFailed { reason: String },
}

impl AttendanceState {
    pub fn is_checked_in(&self) -> bool {
        matches!(self, Self::CheckedIn { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotCheckedIn => "NOT_CHECKED_IN",
            Self::CheckedIn { .. } => "CHECKED_IN",
            Self::CheckInFailed { .. } => "CHECK_IN_FAILED",
        }
    }
}

/// A resolved position and its evaluation against the geofence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatedFix {
    pub coordinates: Coordinates,
    pub distance_meters: f64,
    pub within_radius: bool,
}

impl LocatedFix {
    pub fn evaluate(coordinates: Coordinates, geofence: &Geofence) -> Self {
        let distance_meters = geofence.distance_from_reference(coordinates);
        Self {
            coordinates,
            distance_meters,
            within_radius: geofence.admits(distance_meters),
        }
    }
}

/// Location state for one page entry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LocationState {
    /// No request issued since the page was entered.
    #[default]
    Idle,
    Locating(PendingFix),
    Located(LocatedFix),
    Failed(LocationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReportRejected {
    #[error("no location request is pending")]
    NotRequested,
}

impl LocationState {
    pub fn fix(&self) -> Option<&LocatedFix> {
        match self {
            Self::Located(fix) => Some(fix),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Turns a request nobody answered before its deadline into a timeout.
    /// Returns true when the state changed.
    pub fn expire(&mut self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self {
            Self::Locating(pending) if pending.is_expired(now, skew) => {
                *self = Self::Failed(LocationError::Timeout);
                true
            }
            _ => false,
        }
    }

    /// Issues a new request unless a live one is already pending.
    /// Returns true when a new request was issued.
    pub fn request(&mut self, now: DateTime<Utc>, options: PositionOptions, skew: Duration) -> bool {
        self.expire(now, skew);
        if matches!(self, Self::Locating(_)) {
            return false;
        }
        *self = Self::Locating(PendingFix::new(now, options));
        true
    }

    /// Applies a device report to the pending request, clearing it (and its
    /// countdown) whatever the outcome.
    pub fn apply_report(
        &mut self,
        report: &LocationReport,
        now: DateTime<Utc>,
        skew: Duration,
        geofence: &Geofence,
    ) -> Result<(), ReportRejected> {
        let Self::Locating(pending) = *self else {
            return Err(ReportRejected::NotRequested);
        };
        *self = match pending.resolve(report, now, skew) {
            Ok(coordinates) => Self::Located(LocatedFix::evaluate(coordinates, geofence)),
            Err(err) => Self::Failed(err),
        };
        Ok(())
    }
}

/// Wire view of [`LocationState`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LocationView {
    /// `idle`, `locating`, `located` or `failed`.
    #[schema(example = "located")]
    pub state: &'static str,
    #[schema(nullable = true)]
    pub countdown_seconds: Option<u64>,
    #[schema(nullable = true)]
    pub options: Option<PositionOptions>,
    #[schema(nullable = true)]
    pub latitude: Option<f64>,
    #[schema(nullable = true)]
    pub longitude: Option<f64>,
    #[schema(nullable = true)]
    pub distance_meters: Option<f64>,
    #[schema(nullable = true)]
    pub within_radius: Option<bool>,
    #[schema(nullable = true, value_type = Option<String>)]
    pub error: Option<LocationError>,
    #[schema(example = "Location valid")]
    pub message: String,
}

impl LocationView {
    pub fn of(state: &LocationState, now: DateTime<Utc>) -> Self {
        let empty = Self {
            state: "idle",
            countdown_seconds: None,
            options: None,
            latitude: None,
            longitude: None,
            distance_meters: None,
            within_radius: None,
            error: None,
            message: String::new(),
        };

        match state {
            LocationState::Idle => Self {
                message: "Location not requested yet.".into(),
                ..empty
            },
            LocationState::Locating(pending) => Self {
                state: "locating",
                countdown_seconds: Some(pending.countdown.remaining(now)),
                options: Some(pending.options),
                message: "Detecting location...".into(),
                ..empty
            },
            LocationState::Located(fix) => Self {
                state: "located",
                latitude: Some(fix.coordinates.latitude),
                longitude: Some(fix.coordinates.longitude),
                distance_meters: Some(crate::geo::round_distance(fix.distance_meters)),
                within_radius: Some(fix.within_radius),
                message: if fix.within_radius {
                    "Location valid".into()
                } else {
                    format!("Location invalid (too far: {:.1} meters)", fix.distance_meters)
                },
                ..empty
            },
            LocationState::Failed(err) => Self {
                state: "failed",
                error: Some(*err),
                message: err.user_message().into(),
                ..empty
            },
        }
    }
}

/// Wire view of [`AttendanceState`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceView {
    #[schema(example = "NOT_CHECKED_IN")]
    pub state: &'static str,
    /// Local time of today's successful check-in.
    #[schema(nullable = true, example = "08:15:42")]
    pub checked_in_at: Option<String>,
    #[schema(nullable = true)]
    pub last_failure: Option<String>,
    pub can_check_in: bool,
}

impl AttendanceView {
    pub fn of(attendance: &AttendanceState, location: &LocationState) -> Self {
        let (checked_in_at, last_failure) = match attendance {
            AttendanceState::CheckedIn { time } => (Some(time.clone()), None),
            AttendanceState::CheckInFailed { reason } => (None, Some(reason.clone())),
            AttendanceState::NotCheckedIn => (None, None),
        };
        Self {
            state: attendance.label(),
            checked_in_at,
            last_failure,
            can_check_in: can_check_in(attendance, location),
        }
    }
}

/// Check-in is offered iff the day is not closed and the current fix is in range.
pub fn can_check_in(attendance: &AttendanceState, location: &LocationState) -> bool {
    !attendance.is_checked_in() && location.fix().is_some_and(|fix| fix.within_radius)
}
