use actix_web::{HttpResponse, http::header, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AdminSession;
use crate::error::{AppError, ErrorBody};
use crate::model::identity::UserId;
use crate::report::{ExportFormat, MonthRange, MonthlyReport, Summary, export};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReportQuery {
    /// Defaults to the current year.
    pub year: Option<i32>,
    /// 1-12, defaults to the current month.
    pub month: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExportQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    #[param(value_type = String, example = "csv")]
    pub format: ExportFormat,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    #[schema(value_type = Vec<String>)]
    pub users: Vec<UserId>,
}

fn parse_user(raw: &str) -> Result<UserId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid user id {raw:?}")))
}

async fn load_report(
    state: &AppState,
    user: &UserId,
    year: Option<i32>,
    month: Option<u32>,
) -> Result<MonthlyReport, AppError> {
    let today = state.clock.today();
    let range = match (year, month) {
        (None, None) => MonthRange::containing(today),
        (y, m) => MonthRange::new(
            y.unwrap_or_else(|| chrono::Datelike::year(&today)),
            m.unwrap_or_else(|| chrono::Datelike::month(&today)),
        )?,
    };
    let records = state
        .store
        .records_between(user, range.first, range.last)
        .await?;
    Ok(MonthlyReport::build(&range, records))
}

/// Known identities
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "Identities with at least one record", body = UserListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn list_users(
    _admin: AdminSession,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let users = state.store.users().await?;
    Ok(HttpResponse::Ok().json(UserListResponse { users }))
}

/// Monthly report
#[utoipa::path(
    get,
    path = "/api/admin/reports/{user_id}",
    params(("user_id" = String, Path, description = "Identity UUID"), ReportQuery),
    responses(
        (status = 200, description = "Records of the month, newest first, with statistics", body = MonthlyReport),
        (status = 400, description = "Invalid user or month", body = ErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Record store unavailable", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn monthly_report(
    _admin: AdminSession,
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AppError> {
    let user = parse_user(&path)?;
    let report = load_report(&state, &user, query.year, query.month).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Export
#[utoipa::path(
    get,
    path = "/api/admin/reports/{user_id}/export",
    params(("user_id" = String, Path, description = "Identity UUID"), ExportQuery),
    responses(
        (status = 200, description = "File download (CSV, XLSX or PDF)"),
        (status = 400, description = "Invalid user, month or format", body = ErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Nothing to export", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn export_report(
    _admin: AdminSession,
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ExportQuery>,
) -> Result<HttpResponse, AppError> {
    let user = parse_user(&path)?;
    let report = load_report(&state, &user, query.year, query.month).await?;
    let format = query.format;
    let watermark = state.export_watermark.clone();

    let file = web::block(move || export(&report, format, &watermark))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    info!(%user, file = %file.filename, bytes = file.bytes.len(), "Report exported");
    Ok(HttpResponse::Ok()
        .content_type(file.content_type)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.filename),
        ))
        .body(file.bytes))
}

/// AI summary
#[utoipa::path(
    post,
    path = "/api/admin/reports/{user_id}/summary",
    params(("user_id" = String, Path, description = "Identity UUID"), ReportQuery),
    responses(
        (status = 200, description = "Narrative summary of the month", body = Summary),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Nothing to summarize", body = ErrorBody),
        (status = 502, description = "Summary service failed", body = ErrorBody),
        (status = 503, description = "Summary generation is not configured", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn summarize_report(
    _admin: AdminSession,
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AppError> {
    let user = parse_user(&path)?;
    let report = load_report(&state, &user, query.year, query.month).await?;
    let summary = state.summarizer.summarize(&report).await?;
    Ok(HttpResponse::Ok().json(summary))
}
