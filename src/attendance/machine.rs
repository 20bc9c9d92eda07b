//! The once-per-day, geofenced check-in logic.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::state::{AttendanceState, LocatedFix};
use crate::geo::{Geofence, round_distance};
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, NewAttendanceRecord, REASON_ALREADY_CHECKED_IN,
    REASON_TOO_FAR,
};
use crate::model::identity::UserId;
use crate::store::{AttendanceStore, StoreError};

/// Result of evaluating today's records.
#[derive(Debug, Clone, PartialEq)]
pub struct DayStatus {
    pub state: AttendanceState,
    pub records_today: usize,
}

/// Result of a check-in attempt that reached a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInOutcome {
    /// No resolved position; a fresh location request is needed.
    LocationUnknown,
    /// Today is already closed. `record` is the audit entry written when a
    /// concurrent writer won the conditional write, otherwise `None`.
    AlreadyCheckedIn {
        time: String,
        record: Option<AttendanceRecord>,
    },
    TooFar { record: AttendanceRecord },
    CheckedIn { record: AttendanceRecord },
}

impl CheckInOutcome {
    /// The attendance state this outcome leaves the session in, if it changes it.
    pub fn next_state(&self) -> Option<AttendanceState> {
        match self {
            Self::LocationUnknown => None,
            Self::AlreadyCheckedIn { time, .. } => Some(AttendanceState::CheckedIn { time: time.clone() }),
            Self::TooFar { .. } => Some(AttendanceState::CheckInFailed {
                reason: REASON_TOO_FAR.into(),
            }),
            Self::CheckedIn { record } => Some(AttendanceState::CheckedIn {
                time: record.time.clone(),
            }),
        }
    }
}

pub struct AttendanceMachine<'a> {
    store: &'a dyn AttendanceStore,
    clock: &'a dyn Clock,
    geofence: Geofence,
}

impl<'a> AttendanceMachine<'a> {
    pub fn new(store: &'a dyn AttendanceStore, clock: &'a dyn Clock, geofence: Geofence) -> Self {
        Self {
            store,
            clock,
            geofence,
        }
    }

    /// Derives today's state from the stored records.
    pub async fn evaluate_today(&self, user: &UserId) -> Result<DayStatus, StoreError> {
        let today = self.clock.today();
        let records = self.store.records_on(user, today).await?;

        let state = match records.iter().find(|r| r.is_success()) {
            Some(success) => AttendanceState::CheckedIn {
                time: success.time.clone(),
            },
            None => AttendanceState::NotCheckedIn,
        };
        debug!(%user, %today, records = records.len(), state = state.label(), "Evaluated today's attendance");

        Ok(DayStatus {
            state,
            records_today: records.len(),
        })
    }

    /// Attempts today's check-in from the last resolved position.
    ///
    /// Store failures are returned as errors; the caller reverts the session
    /// to `NOT_CHECKED_IN`.
    pub async fn attempt_check_in(
        &self,
        user: &UserId,
        fix: Option<&LocatedFix>,
    ) -> Result<CheckInOutcome, StoreError> {
        let Some(fix) = fix else {
            return Ok(CheckInOutcome::LocationUnknown);
        };

        let now = self.clock.now();
        let today = now.date_naive();

        if let Some(existing) = self.store.success_on(user, today).await? {
            info!(%user, %today, time = %existing.time, "Check-in rejected: already checked in");
            return Ok(CheckInOutcome::AlreadyCheckedIn {
                time: existing.time,
                record: None,
            });
        }

        // re-evaluate against the current fence rather than trusting the cached flag
        let distance = self.geofence.distance_from_reference(fix.coordinates);
        let draft = |status: AttendanceStatus, reason: Option<&str>| NewAttendanceRecord {
            user_id: *user,
            timestamp: now.with_timezone(&Utc),
            date: today,
            time: now.format("%H:%M:%S").to_string(),
            latitude: fix.coordinates.latitude,
            longitude: fix.coordinates.longitude,
            distance_to_store: round_distance(distance),
            status,
            reason: reason.map(str::to_owned),
        };

        if !self.geofence.admits(distance) {
            let record = self
                .store
                .append(draft(AttendanceStatus::Failed, Some(REASON_TOO_FAR)))
                .await?;
            info!(%user, %today, distance = record.distance_to_store, "Check-in failed: too far");
            return Ok(CheckInOutcome::TooFar { record });
        }

        match self.store.append(draft(AttendanceStatus::Succeeded, None)).await {
            Ok(record) => {
                info!(%user, %today, time = %record.time, "Check-in recorded");
                Ok(CheckInOutcome::CheckedIn { record })
            }
            Err(StoreError::DuplicateSuccess { .. }) => {
                // another session won between the re-check and the write
                warn!(%user, %today, "Concurrent check-in detected");
                let time = self
                    .store
                    .success_on(user, today)
                    .await?
                    .map(|r| r.time)
                    .unwrap_or_default();
                let record = self
                    .store
                    .append(draft(AttendanceStatus::Failed, Some(REASON_ALREADY_CHECKED_IN)))
                    .await?;
                Ok(CheckInOutcome::AlreadyCheckedIn {
                    time,
                    record: Some(record),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::clock::FixedClock;
    use crate::geo::Coordinates;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const STORE_AT: Coordinates = Coordinates::new(-6.533322, 108.455498);

    fn fence() -> Geofence {
        Geofence::new(STORE_AT, 50.0)
    }

    fn morning() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 2, 8, 15, 42)
            .unwrap()
    }

    fn fix_at(coordinates: Coordinates) -> LocatedFix {
        LocatedFix::evaluate(coordinates, &fence())
    }

    fn far_away() -> Coordinates {
        Coordinates::new(STORE_AT.latitude + 0.002, STORE_AT.longitude)
    }

    #[actix_web::test]
    async fn unknown_location_writes_nothing() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(morning());
        let machine = AttendanceMachine::new(&store, &clock, fence());

        let outcome = machine.attempt_check_in(&UserId::new(), None).await.unwrap();
        assert_eq!(outcome, CheckInOutcome::LocationUnknown);
        assert_eq!(outcome.next_state(), None);
        assert!(store.is_empty());
    }

    #[actix_web::test]
    async fn check_in_at_reference_point_then_second_attempt_is_rejected() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(morning());
        let machine = AttendanceMachine::new(&store, &clock, fence());
        let user = UserId::new();
        let fix = fix_at(STORE_AT);
        assert_eq!(fix.distance_meters, 0.0);

        let first = machine.attempt_check_in(&user, Some(&fix)).await.unwrap();
        let CheckInOutcome::CheckedIn { record } = &first else {
            panic!("expected success, got {first:?}");
        };
        assert_eq!(record.time, "08:15:42");
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(record.distance_to_store, 0.0);
        assert_eq!(store.len(), 1);

        clock.advance(Duration::minutes(5));
        let second = machine.attempt_check_in(&user, Some(&fix)).await.unwrap();
        assert_eq!(
            second,
            CheckInOutcome::AlreadyCheckedIn {
                time: "08:15:42".into(),
                record: None
            }
        );
        assert_eq!(store.len(), 1);
        assert!(machine.evaluate_today(&user).await.unwrap().state.is_checked_in());
    }

    #[actix_web::test]
    async fn too_far_is_logged_and_a_later_attempt_in_range_succeeds() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(morning());
        let machine = AttendanceMachine::new(&store, &clock, fence());
        let user = UserId::new();

        let outcome = machine
            .attempt_check_in(&user, Some(&fix_at(far_away())))
            .await
            .unwrap();
        let CheckInOutcome::TooFar { record } = &outcome else {
            panic!("expected too far, got {outcome:?}");
        };
        assert_eq!(record.status, AttendanceStatus::Failed);
        assert_eq!(record.reason.as_deref(), Some(REASON_TOO_FAR));
        assert_eq!(
            outcome.next_state(),
            Some(AttendanceState::CheckInFailed {
                reason: REASON_TOO_FAR.into()
            })
        );

        let status = machine.evaluate_today(&user).await.unwrap();
        assert_eq!(status.state, AttendanceState::NotCheckedIn);
        assert_eq!(status.records_today, 1);

        clock.advance(Duration::minutes(10));
        let outcome = machine
            .attempt_check_in(&user, Some(&fix_at(STORE_AT)))
            .await
            .unwrap();
        assert!(matches!(outcome, CheckInOutcome::CheckedIn { .. }));
        assert_eq!(store.len(), 2);
    }

    #[actix_web::test]
    async fn next_day_is_a_fresh_start() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(morning());
        let machine = AttendanceMachine::new(&store, &clock, fence());
        let user = UserId::new();
        let fix = fix_at(STORE_AT);

        machine.attempt_check_in(&user, Some(&fix)).await.unwrap();
        clock.advance(Duration::days(1));
        assert_eq!(
            machine.evaluate_today(&user).await.unwrap().state,
            AttendanceState::NotCheckedIn
        );
        let outcome = machine.attempt_check_in(&user, Some(&fix)).await.unwrap();
        assert!(matches!(outcome, CheckInOutcome::CheckedIn { .. }));
    }

    /// Hides existing successes from the re-check, as a concurrent writer would.
    struct RacingStore {
        inner: MemoryStore,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl AttendanceStore for RacingStore {
        async fn records_on(
            &self,
            user: &UserId,
            date: NaiveDate,
        ) -> Result<Vec<AttendanceRecord>, StoreError> {
            self.inner.records_on(user, date).await
        }

        async fn success_on(
            &self,
            user: &UserId,
            date: NaiveDate,
        ) -> Result<Option<AttendanceRecord>, StoreError> {
            let found = self.inner.success_on(user, date).await?;
            // the first lookup happens before the other writer lands
            let first = self.lookups.fetch_add(1, Ordering::SeqCst) == 0;
            Ok(found.filter(|_| !first))
        }

        async fn records_between(
            &self,
            user: &UserId,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<AttendanceRecord>, StoreError> {
            self.inner.records_between(user, from, to).await
        }

        async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
            self.inner.append(record).await
        }

        async fn users(&self) -> Result<Vec<UserId>, StoreError> {
            self.inner.users().await
        }
    }

    #[actix_web::test]
    async fn losing_the_conditional_write_is_reported_as_already_checked_in() {
        let store = RacingStore {
            inner: MemoryStore::new(),
            lookups: AtomicUsize::new(0),
        };
        let clock = FixedClock::new(morning());
        let machine = AttendanceMachine::new(&store, &clock, fence());
        let user = UserId::new();
        let fix = fix_at(STORE_AT);

        // the other device's success
        let winner = MemoryStore::new();
        let other = AttendanceMachine::new(&winner, &clock, fence());
        let CheckInOutcome::CheckedIn { record } = other.attempt_check_in(&user, Some(&fix)).await.unwrap() else {
            panic!("winner should check in");
        };
        store
            .append(NewAttendanceRecord {
                user_id: record.user_id,
                timestamp: record.timestamp,
                date: record.date,
                time: record.time.clone(),
                latitude: record.latitude,
                longitude: record.longitude,
                distance_to_store: record.distance_to_store,
                status: record.status,
                reason: None,
            })
            .await
            .unwrap();

        clock.advance(Duration::seconds(1));
        let outcome = machine.attempt_check_in(&user, Some(&fix)).await.unwrap();
        let CheckInOutcome::AlreadyCheckedIn { time, record } = outcome else {
            panic!("expected conflict");
        };
        assert_eq!(time, "08:15:42");
        let audit = record.expect("conflict is logged");
        assert_eq!(audit.status, AttendanceStatus::Failed);
        assert_eq!(audit.reason.as_deref(), Some(REASON_ALREADY_CHECKED_IN));

        let today = clock.today();
        let successes = store
            .records_on(&user, today)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.is_success())
            .count();
        assert_eq!(successes, 1);
    }

    struct DownStore;

    #[async_trait]
    impl AttendanceStore for DownStore {
        async fn records_on(&self, _: &UserId, _: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn success_on(&self, _: &UserId, _: NaiveDate) -> Result<Option<AttendanceRecord>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn records_between(
            &self,
            _: &UserId,
            _: NaiveDate,
            _: NaiveDate,
        ) -> Result<Vec<AttendanceRecord>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn append(&self, _: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn users(&self) -> Result<Vec<UserId>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    #[actix_web::test]
    async fn store_outage_surfaces_as_error() {
        let clock = FixedClock::new(morning());
        let machine = AttendanceMachine::new(&DownStore, &clock, fence());
        let err = machine
            .attempt_check_in(&UserId::new(), Some(&fix_at(STORE_AT)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(machine.evaluate_today(&UserId::new()).await.is_err());
    }
}
