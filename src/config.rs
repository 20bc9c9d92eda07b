use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use thiserror::Error;

use crate::attendance::clock::parse_utc_offset;
use crate::geo::{Coordinates, Geofence};
use crate::report::summary::{DEFAULT_API_URL, DEFAULT_MODEL, SummaryConfig};

const DAY: u64 = 86_400;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    /// Unset runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub identity_token_ttl: u64,
    pub admin_session_ttl: u64,
    pub admin_passphrase_hash: String,

    pub geofence: Geofence,
    pub utc_offset: FixedOffset,
    pub location_timeout_secs: u64,
    pub location_clock_skew_secs: i64,
    pub session_idle_secs: u64,

    // Rate limiting
    pub rate_identity_per_min: u32,
    pub rate_attendance_per_min: u32,

    pub api_prefix: String,

    pub summary: SummaryConfig,
    pub export_watermark: String,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let reference = Coordinates::new(
            vars.required_parsed("REFERENCE_LATITUDE")?,
            vars.required_parsed("REFERENCE_LONGITUDE")?,
        );
        if !(-90.0..=90.0).contains(&reference.latitude) {
            return Err(vars.invalid("REFERENCE_LATITUDE"));
        }
        if !(-180.0..=180.0).contains(&reference.longitude) {
            return Err(vars.invalid("REFERENCE_LONGITUDE"));
        }
        let max_distance: f64 = vars.parsed_or("MAX_DISTANCE_METERS", 50.0)?;
        if !max_distance.is_finite() || max_distance < 0.0 {
            return Err(vars.invalid("MAX_DISTANCE_METERS"));
        }

        let utc_offset = match vars.get("ATTENDANCE_UTC_OFFSET") {
            Some(raw) => parse_utc_offset(&raw).ok_or(ConfigError::Invalid {
                var: "ATTENDANCE_UTC_OFFSET",
                value: raw,
            })?,
            None => FixedOffset::east_opt(7 * 3600).ok_or(ConfigError::Invalid {
                var: "ATTENDANCE_UTC_OFFSET",
                value: "+07:00".into(),
            })?,
        };

        Ok(Self {
            server_addr: vars.required("SERVER_ADDR")?,
            database_url: vars.get("DATABASE_URL").filter(|url| !url.is_empty()),
            jwt_secret: vars.required("JWT_SECRET")?,
            identity_token_ttl: vars.parsed_in("IDENTITY_TOKEN_TTL", 31_536_000, 60..=10 * 365 * DAY)?, // 1 year
            admin_session_ttl: vars.parsed_in("ADMIN_SESSION_TTL", 3600, 60..=30 * DAY)?,
            admin_passphrase_hash: vars.required("ADMIN_PASSPHRASE_HASH")?,

            geofence: Geofence::new(reference, max_distance),
            utc_offset,
            location_timeout_secs: vars.parsed_in("LOCATION_TIMEOUT_SECS", 10, 1..=600)?,
            location_clock_skew_secs: vars.parsed_in("LOCATION_CLOCK_SKEW_SECS", 5, 0..=600)?,
            session_idle_secs: vars.parsed_in("SESSION_IDLE_SECS", 1800, 1..=7 * DAY)?,

            rate_identity_per_min: vars.parsed_in("RATE_IDENTITY_PER_MIN", 30, 1..=100_000)?,
            rate_attendance_per_min: vars.parsed_in("RATE_ATTENDANCE_PER_MIN", 120, 1..=100_000)?,

            api_prefix: vars.get("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            summary: SummaryConfig {
                api_url: vars
                    .get("SUMMARY_API_URL")
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                model: vars
                    .get("SUMMARY_MODEL")
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                api_key: vars.get("SUMMARY_API_KEY").filter(|k| !k.is_empty()),
                timeout: Duration::from_secs(vars.parsed_in("SUMMARY_TIMEOUT_SECS", 30, 1..=600)?),
            },
            export_watermark: vars
                .get("EXPORT_WATERMARK")
                .unwrap_or_else(|| "Attendance".to_string()),
            log_dir: vars.get("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var).map(|v| v.trim().to_string())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(var))
    }

    fn required_parsed<T: FromStr>(&self, var: &'static str) -> Result<T, ConfigError> {
        let raw = self.required(var)?;
        raw.parse().map_err(|_| ConfigError::Invalid { var, value: raw })
    }

    fn parsed_or<T: FromStr>(&self, var: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(var).filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { var, value: raw }),
            None => Ok(default),
        }
    }

    fn parsed_in<T: FromStr + PartialOrd>(
        &self,
        var: &'static str,
        default: T,
        range: RangeInclusive<T>,
    ) -> Result<T, ConfigError> {
        let value = self.parsed_or(var, default)?;
        if !range.contains(&value) {
            return Err(self.invalid(var));
        }
        Ok(value)
    }

    fn invalid(&self, var: &'static str) -> ConfigError {
        ConfigError::Invalid {
            var,
            value: self.get(var).unwrap_or_default(),
        }
    }
}
