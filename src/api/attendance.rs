use actix_web::{HttpResponse, http::StatusCode, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::attendance::{
    AttendanceState, AttendanceView, CheckInOutcome, LocationState, LocationView, PageSession,
};
use crate::auth::auth::DeviceIdentity;
use crate::error::{AppError, ErrorBody};
use crate::geo::LocationReport;
use crate::model::attendance::AttendanceRecord;
use crate::state::AppState;

/// Attendance page state as the device should render it.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub attendance: AttendanceView,
    pub location: LocationView,
    /// The device should run a position request with `location.options`.
    pub locate: bool,
    #[schema(nullable = true)]
    pub records_today: Option<usize>,
}

impl SessionView {
    fn of(session: &PageSession, now: DateTime<Utc>) -> Self {
        Self {
            attendance: AttendanceView::of(&session.attendance, &session.location),
            location: LocationView::of(&session.location, now),
            locate: matches!(session.location, LocationState::Locating(_)),
            records_today: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckInResponse {
    #[schema(example = "Check-in successful at 08:15:42")]
    pub message: String,
    /// The record written by this attempt, if any.
    #[schema(nullable = true)]
    pub record: Option<AttendanceRecord>,
    pub session: SessionView,
}

fn now_utc(state: &AppState) -> DateTime<Utc> {
    state.clock.now().with_timezone(&Utc)
}

/// Page entry
#[utoipa::path(
    post,
    path = "/api/attendance/session",
    responses(
        (status = 200, description = "Fresh page session; `locate` tells the device to request a fix", body = SessionView),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Record store unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn enter(
    identity: DeviceIdentity,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = identity.0;
    state.sessions.discard(&user).await;
    let handle = state.sessions.get_or_create(&user).await;
    let mut session = handle.lock().await;

    let day = match state.machine().evaluate_today(&user).await {
        Ok(day) => day,
        Err(e) => {
            session.attendance = AttendanceState::NotCheckedIn;
            return Err(e.into());
        }
    };
    session.attendance = day.state;

    // a closed day needs no position
    if !session.attendance.is_checked_in() {
        session
            .location
            .request(now_utc(&state), state.position_options, state.clock_skew);
    }
    info!(%user, state = session.attendance.label(), "Attendance page entered");

    let mut view = SessionView::of(&session, now_utc(&state));
    view.records_today = Some(day.records_today);
    Ok(HttpResponse::Ok().json(view))
}

/// Page exit
#[utoipa::path(
    delete,
    path = "/api/attendance/session",
    responses(
        (status = 204, description = "Session and any pending location request discarded"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn leave(identity: DeviceIdentity, state: web::Data<AppState>) -> HttpResponse {
    state.sessions.discard(&identity.0).await;
    HttpResponse::NoContent().finish()
}

/// Today's status
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's attendance state", body = SessionView),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Record store unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(
    identity: DeviceIdentity,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = identity.0;
    let day = state.machine().evaluate_today(&user).await?;

    let session = match state.sessions.get(&user).await {
        Some(handle) => {
            let mut session = handle.lock().await;
            session.location.expire(now_utc(&state), state.clock_skew);
            // keep a same-day failure, drop a check-in from a previous day
            if day.state.is_checked_in() || session.attendance.is_checked_in() {
                session.attendance = day.state;
            }
            session.clone()
        }
        None => PageSession {
            attendance: day.state,
            ..PageSession::default()
        },
    };

    let mut view = SessionView::of(&session, now_utc(&state));
    view.records_today = Some(day.records_today);
    Ok(HttpResponse::Ok().json(view))
}

/// Location report
#[utoipa::path(
    post,
    path = "/api/attendance/location",
    request_body = LocationReport,
    responses(
        (status = 200, description = "Report applied", body = SessionView),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "No location request pending", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn report_location(
    identity: DeviceIdentity,
    state: web::Data<AppState>,
    report: web::Json<LocationReport>,
) -> Result<HttpResponse, AppError> {
    let user = identity.0;
    let handle = state
        .sessions
        .get(&user)
        .await
        .ok_or_else(|| AppError::Conflict("no location request pending".into()))?;
    let mut session = handle.lock().await;

    let now = now_utc(&state);
    session
        .location
        .apply_report(&report, now, state.clock_skew, &state.geofence)
        .map_err(|_| AppError::Conflict("no location request pending".into()))?;

    match &session.location {
        LocationState::Located(fix) => info!(
            %user,
            distance = fix.distance_meters,
            within_radius = fix.within_radius,
            "Location resolved"
        ),
        LocationState::Failed(err) => warn!(%user, error = %err, "Location failed"),
        _ => {}
    }

    Ok(HttpResponse::Ok().json(SessionView::of(&session, now)))
}

/// Location retry
#[utoipa::path(
    post,
    path = "/api/attendance/location/retry",
    responses(
        (status = 202, description = "New location request issued", body = SessionView),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A request is pending or the current fix is already valid", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn retry_location(
    identity: DeviceIdentity,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let handle = state.sessions.get_or_create(&identity.0).await;
    let mut session = handle.lock().await;

    let now = now_utc(&state);
    session.location.expire(now, state.clock_skew);

    // only a failure or an out-of-radius fix warrants a new request
    match session.location {
        LocationState::Locating(_) => {
            return Err(AppError::Conflict("location request already pending".into()));
        }
        LocationState::Located(fix) if fix.within_radius => {
            return Err(AppError::Conflict("location already valid".into()));
        }
        _ => {}
    }

    session.location = LocationState::Idle;
    session
        .location
        .request(now, state.position_options, state.clock_skew);

    Ok(HttpResponse::Accepted().json(SessionView::of(&session, now)))
}

/// Check-in
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 201, description = "Checked in", body = CheckInResponse),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already checked in today, or a check-in is in progress", body = CheckInResponse),
        (status = 422, description = "Too far from the premises; a failed attempt was recorded", body = CheckInResponse),
        (status = 428, description = "Location unknown; a new location request was issued", body = CheckInResponse),
        (status = 503, description = "Record store unavailable", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    identity: DeviceIdentity,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = identity.0;
    let mut session = state
        .sessions
        .try_lock(&user)
        .await
        .ok_or_else(|| AppError::Conflict("check-in already in progress".into()))?;

    let now = now_utc(&state);
    session.location.expire(now, state.clock_skew);
    let fix = session.location.fix().copied();
    let outcome = match state.machine().attempt_check_in(&user, fix.as_ref()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            session.attendance = AttendanceState::NotCheckedIn;
            return Err(e.into());
        }
    };

    if let Some(next) = outcome.next_state() {
        session.attendance = next;
    }

    let (status, message, record) = match outcome {
        CheckInOutcome::LocationUnknown => {
            session
                .location
                .request(now, state.position_options, state.clock_skew);
            (
                StatusCode::PRECONDITION_REQUIRED,
                "Location unknown. Please allow location access and try again.".to_string(),
                None,
            )
        }
        CheckInOutcome::AlreadyCheckedIn { time, record } => (
            StatusCode::CONFLICT,
            format!("You have already checked in today at {time}."),
            record,
        ),
        CheckInOutcome::TooFar { record } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!(
                "Check-in failed: you are too far from the premises ({:.1} meters).",
                record.distance_to_store
            ),
            Some(record),
        ),
        CheckInOutcome::CheckedIn { record } => (
            StatusCode::CREATED,
            format!("Check-in successful at {}.", record.time),
            Some(record),
        ),
    };

    Ok(HttpResponse::build(status).json(CheckInResponse {
        message,
        record,
        session: SessionView::of(&session, now),
    }))
}

