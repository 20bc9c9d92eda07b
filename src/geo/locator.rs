//! Device geolocation contract.
//!
//! The device owns the sensor. The service issues a request carrying
//! [`PositionOptions`], tracks it as a [`PendingFix`], and classifies the
//! report the device sends back.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::AsRefStr;
use thiserror::Error;
use utoipa::ToSchema;

use super::distance::Coordinates;

/// Options the device must pass to its geolocation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PositionOptions {
    #[schema(example = true)]
    pub enable_high_accuracy: bool,
    /// Milliseconds.
    #[schema(example = 10000)]
    pub timeout: u64,
    /// Milliseconds; zero refuses cached positions.
    #[schema(example = 0)]
    pub maximum_age: u64,
}

impl PositionOptions {
    pub fn with_timeout_secs(secs: u64) -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: secs * 1000,
            maximum_age: 0,
        }
    }
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self::with_timeout_secs(10)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize, ToSchema, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("location request timed out")]
    Timeout,
    #[error("geolocation unsupported")]
    Unsupported,
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Location permission denied. Please allow location access in your browser."
            }
            Self::PositionUnavailable => "Location information is unavailable.",
            Self::Timeout => "Timed out while getting your location. Check your connection or GPS.",
            Self::Unsupported => "Geolocation is not supported by your browser.",
        }
    }
}

/// What the device sends back after running the position request.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LocationReport {
    Fix {
        #[schema(example = -6.533322)]
        latitude: f64,
        #[schema(example = 108.455498)]
        longitude: f64,
        /// When the device obtained the fix.
        #[schema(value_type = Option<String>, format = "date-time")]
        captured_at: Option<DateTime<Utc>>,
    },
    Error { code: LocationError },
}

/// Visible countdown shown while a request is pending. Purely cosmetic:
/// the enforced timeout lives in [`PendingFix::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    started_at: DateTime<Utc>,
    seconds: u64,
}

impl Countdown {
    pub fn start(started_at: DateTime<Utc>, seconds: u64) -> Self {
        Self {
            started_at,
            seconds,
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - self.started_at).num_seconds().max(0) as u64;
        self.seconds.saturating_sub(elapsed)
    }
}

/// An outstanding request for a position fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFix {
    pub requested_at: DateTime<Utc>,
    pub options: PositionOptions,
    pub countdown: Countdown,
}

impl PendingFix {
    pub fn new(requested_at: DateTime<Utc>, options: PositionOptions) -> Self {
        Self {
            requested_at,
            options,
            countdown: Countdown::start(requested_at, options.timeout / 1000),
        }
    }

    /// Last instant a report is still accepted.
    pub fn deadline(&self, skew: Duration) -> DateTime<Utc> {
        self.requested_at + Duration::milliseconds(self.options.timeout as i64) + skew
    }

    pub fn is_expired(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now > self.deadline(skew)
    }

    /// Classifies a device report received at `now`.
    ///
    /// `skew` absorbs clock drift between the device and the service.
    pub fn resolve(
        &self,
        report: &LocationReport,
        now: DateTime<Utc>,
        skew: Duration,
    ) -> Result<Coordinates, LocationError> {
        if self.is_expired(now, skew) {
            return Err(LocationError::Timeout);
        }

        match report {
            LocationReport::Error { code } => Err(*code),
            LocationReport::Fix {
                latitude,
                longitude,
                captured_at,
            } => {
                if !latitude.is_finite()
                    || !longitude.is_finite()
                    || latitude.abs() > 90.0
                    || longitude.abs() > 180.0
                {
                    return Err(LocationError::PositionUnavailable);
                }
                let oldest = self.requested_at - Duration::milliseconds(self.options.maximum_age as i64) - skew;
                if captured_at.is_some_and(|at| at < oldest) {
                    return Err(LocationError::PositionUnavailable);
                }
                Ok(Coordinates::new(*latitude, *longitude))
            }
        }
    }
}
