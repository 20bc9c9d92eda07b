use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::state::{AttendanceState, LocationState};
use crate::model::identity::UserId;

/// UI state of one device between entering and leaving the attendance page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSession {
    pub attendance: AttendanceState,
    pub location: LocationState,
}

pub type SessionHandle = Arc<Mutex<PageSession>>;

/// Page sessions keyed by identity. Idle sessions expire, which counts as
/// leaving the page.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Cache<UserId, SessionHandle>,
}

impl SessionRegistry {
    pub fn new(max_sessions: u64, idle: Duration) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(idle)
                .build(),
        }
    }

    /// The session for `user`, created empty when missing.
    pub async fn get_or_create(&self, user: &UserId) -> SessionHandle {
        self.sessions
            .get_with(*user, async { Arc::new(Mutex::new(PageSession::default())) })
            .await
    }

    /// Existing session only; a late event after leaving finds nothing.
    pub async fn get(&self, user: &UserId) -> Option<SessionHandle> {
        self.sessions.get(user).await
    }

    /// Locks the session for an operation that must not overlap another
    /// one, failing instead of waiting.
    pub async fn try_lock(&self, user: &UserId) -> Option<OwnedMutexGuard<PageSession>> {
        self.get_or_create(user).await.try_lock_owned().ok()
    }

    /// Leaving the page discards everything, including a pending location request.
    pub async fn discard(&self, user: &UserId) {
        self.sessions.invalidate(user).await;
    }
}
