use crate::api::attendance::{CheckInResponse, SessionView};
use crate::api::report::UserListResponse;
use crate::attendance::{AttendanceView, LocationView};
use crate::auth::handlers::{AdminLoginRequest, AdminLoginResponse, IdentityResponse};
use crate::error::ErrorBody;
use crate::geo::{Coordinates, LocationError, LocationReport, PositionOptions};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::report::{MonthlyReport, ReportStats, Summary};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Geofenced Attendance API",
        version = "0.1.0",
        description = r#"
## Geofenced daily attendance

Devices hold an anonymous identity and check in **once per calendar day**, only
from within a fixed radius of the premises. Every attempt is recorded, including
failed ones.

### Device flow
1. `POST /auth/anonymous` for an identity token
2. `POST /api/attendance/session` on page entry; when `locate` is true, run a
   position request with the returned options
3. `POST /api/attendance/location` with the fix or the classified error
4. `POST /api/attendance/check-in`

### Admin
`POST /auth/admin/login` with the shared passphrase, then monthly reports,
CSV/XLSX/PDF exports and an optional AI summary under `/api/admin`.
"#,
    ),
    paths(
        crate::auth::handlers::anonymous,
        crate::auth::handlers::admin_login,
        crate::auth::handlers::admin_logout,

        crate::api::attendance::enter,
        crate::api::attendance::leave,
        crate::api::attendance::today,
        crate::api::attendance::report_location,
        crate::api::attendance::retry_location,
        crate::api::attendance::check_in,

        crate::api::report::list_users,
        crate::api::report::monthly_report,
        crate::api::report::export_report,
        crate::api::report::summarize_report
    ),
    components(
        schemas(
            IdentityResponse,
            AdminLoginRequest,
            AdminLoginResponse,
            ErrorBody,
            SessionView,
            CheckInResponse,
            AttendanceView,
            LocationView,
            LocationReport,
            LocationError,
            PositionOptions,
            Coordinates,
            AttendanceRecord,
            AttendanceStatus,
            MonthlyReport,
            ReportStats,
            Summary,
            UserListResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Device identity and admin gate"),
        (name = "Attendance", description = "Daily geofenced check-in"),
        (name = "Reports", description = "Monthly reports, exports and summaries"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
