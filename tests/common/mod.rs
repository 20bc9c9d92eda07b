#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::test::TestRequest;
use actix_web::web::Data;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use geoattend::attendance::FixedClock;
use geoattend::auth::password::hash_password;
use geoattend::config::Config;
use geoattend::model::attendance::{AttendanceRecord, NewAttendanceRecord};
use geoattend::model::identity::UserId;
use geoattend::state::AppState;
use geoattend::store::{AttendanceStore, MemoryStore, StoreError};

pub const ADMIN_PASSPHRASE: &str = "correct horse";
pub const STORE_LAT: f64 = -6.533322;
pub const STORE_LON: f64 = 108.455498;

pub struct TestEnv {
    pub config: Config,
    pub state: Data<AppState>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    store_down: Arc<AtomicBool>,
}

impl TestEnv {
    /// Makes every store call fail until switched back.
    pub fn set_store_down(&self, down: bool) {
        self.store_down.store(down, Ordering::SeqCst);
    }
}

/// Memory store that can be taken offline.
struct SwitchableStore {
    inner: Arc<MemoryStore>,
    down: Arc<AtomicBool>,
}

impl SwitchableStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for SwitchableStore {
    async fn records_on(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.check()?;
        self.inner.records_on(user, date).await
    }

    async fn success_on(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        self.check()?;
        self.inner.success_on(user, date).await
    }

    async fn records_between(
        &self,
        user: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.check()?;
        self.inner.records_between(user, from, to).await
    }

    async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        self.check()?;
        self.inner.append(record).await
    }

    async fn users(&self) -> Result<Vec<UserId>, StoreError> {
        self.check()?;
        self.inner.users().await
    }
}

/// 2026-03-02 08:15:42 in the attendance timezone (+07:00).
pub fn morning() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(7 * 3600)
        .unwrap()
        .with_ymd_and_hms(2026, 3, 2, 8, 15, 42)
        .unwrap()
}

pub fn env() -> TestEnv {
    env_with(&[])
}

pub fn env_with(overrides: &[(&str, &str)]) -> TestEnv {
    let hash = hash_password(ADMIN_PASSPHRASE).unwrap();
    let mut vars: HashMap<String, String> = [
        ("SERVER_ADDR", "127.0.0.1:0"),
        ("JWT_SECRET", "integration-secret"),
        ("REFERENCE_LATITUDE", "-6.533322"),
        ("REFERENCE_LONGITUDE", "108.455498"),
        ("MAX_DISTANCE_METERS", "50"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert("ADMIN_PASSPHRASE_HASH".into(), hash);
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }

    let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
    let store = Arc::new(MemoryStore::new());
    let store_down = Arc::new(AtomicBool::new(false));
    let switchable = Arc::new(SwitchableStore {
        inner: store.clone(),
        down: store_down.clone(),
    });
    let clock = Arc::new(FixedClock::new(morning()));
    let state = Data::new(AppState::new(&config, switchable, clock.clone()).unwrap());

    TestEnv {
        config,
        state,
        store,
        clock,
        store_down,
    }
}

fn peer() -> SocketAddr {
    "10.0.0.7:40000".parse().unwrap()
}

pub fn post(uri: &str) -> TestRequest {
    TestRequest::post().uri(uri).peer_addr(peer())
}

pub fn get(uri: &str) -> TestRequest {
    TestRequest::get().uri(uri).peer_addr(peer())
}

pub fn delete(uri: &str) -> TestRequest {
    TestRequest::delete().uri(uri).peer_addr(peer())
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// Builds the full application around a [`TestEnv`].
#[macro_export]
macro_rules! test_app {
    ($env:expr) => {{
        let routes_config = $env.config.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($env.state.clone())
                .app_data(actix_web::web::Data::new($env.config.clone()))
                .configure(move |cfg| geoattend::routes::configure(cfg, routes_config)),
        )
        .await
    }};
}

/// Issues a fresh anonymous identity, yielding `(user_id, token)`.
#[macro_export]
macro_rules! issue_identity {
    ($app:expr) => {{
        let resp = actix_web::test::call_service(
            &$app,
            crate::common::post("/auth/anonymous").to_request(),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        (
            body["user_id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }};
}
