use std::sync::Arc;
use std::time::Duration;

use crate::attendance::{AttendanceMachine, Clock, SessionRegistry};
use crate::auth::auth::RevokedTokens;
use crate::config::Config;
use crate::geo::{Geofence, PositionOptions};
use crate::report::{SummaryClient, SummaryError};
use crate::store::AttendanceStore;

const MAX_SESSIONS: u64 = 10_000;

/// Shared services behind every handler.
pub struct AppState {
    pub store: Arc<dyn AttendanceStore>,
    pub clock: Arc<dyn Clock>,
    pub sessions: SessionRegistry,
    pub summarizer: SummaryClient,
    pub revoked: RevokedTokens,
    pub geofence: Geofence,
    pub position_options: PositionOptions,
    pub clock_skew: chrono::Duration,
    pub export_watermark: String,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SummaryError> {
        Ok(Self {
            store,
            clock,
            sessions: SessionRegistry::new(
                MAX_SESSIONS,
                Duration::from_secs(config.session_idle_secs),
            ),
            summarizer: SummaryClient::new(config.summary.clone())?,
            // only admin tokens are ever revoked
            revoked: RevokedTokens::new(Duration::from_secs(config.admin_session_ttl)),
            geofence: config.geofence,
            position_options: PositionOptions::with_timeout_secs(config.location_timeout_secs),
            clock_skew: chrono::Duration::seconds(config.location_clock_skew_secs),
            export_watermark: config.export_watermark.clone(),
        })
    }

    pub fn machine(&self) -> AttendanceMachine<'_> {
        AttendanceMachine::new(self.store.as_ref(), self.clock.as_ref(), self.geofence)
    }
}
