use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::{
        auth::{authenticate, bearer_token},
        jwt::{ADMIN_SUBJECT, generate_token},
        password::verify_password,
    },
    config::Config,
    error::{AppError, ErrorBody},
    model::{identity::UserId, role::Role},
    state::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub token: String,
    /// Unix seconds.
    pub expires_at: usize,
    /// False when a new identity was created.
    pub reconciled: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AdminLoginRequest {
    pub passphrase: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminLoginResponse {
    pub token: String,
    /// Seconds.
    pub expires_in: u64,
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("failed to sign token: {e}"))
}

/// Anonymous identity
///
/// A device presenting a still valid identity token keeps its identity and
/// gets a fresh token. Anything else yields a new identity.
#[utoipa::path(
    post,
    path = "/auth/anonymous",
    responses(
        (status = 200, description = "Identity token issued", body = IdentityResponse),
        (status = 429, description = "Too many requests")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_anonymous", skip_all)]
pub async fn anonymous(
    req: HttpRequest,
    config: web::Data<Config>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let existing = bearer_token(req.headers())
        .and_then(|token| authenticate(token, &config.jwt_secret, &state.revoked).ok())
        .filter(|user| user.role() == Role::Device)
        .and_then(|user| user.claims.sub.parse::<UserId>().ok());

    let (user_id, reconciled) = match existing {
        Some(id) => (id, true),
        None => (UserId::new(), false),
    };

    let (token, claims) = generate_token(
        user_id.to_string(),
        Role::Device,
        &config.jwt_secret,
        config.identity_token_ttl,
    )
    .map_err(token_error)?;

    info!(%user_id, reconciled, "Identity issued");

    Ok(HttpResponse::Ok().json(IdentityResponse {
        user_id,
        token,
        expires_at: claims.exp,
        reconciled,
    }))
}

/// Admin login
#[utoipa::path(
    post,
    path = "/auth/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Admin session opened", body = AdminLoginResponse),
        (status = 401, description = "Wrong passphrase", body = ErrorBody)
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_admin_login", skip_all)]
pub async fn admin_login(
    body: web::Json<AdminLoginRequest>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    debug!("Verifying admin passphrase");

    if let Err(e) = verify_password(&body.passphrase, &config.admin_passphrase_hash) {
        info!(error = %e, "Admin login rejected");
        return Err(AppError::Unauthorized("Wrong passphrase".into()));
    }

    let (token, _) = generate_token(
        ADMIN_SUBJECT,
        Role::Admin,
        &config.jwt_secret,
        config.admin_session_ttl,
    )
    .map_err(token_error)?;

    info!("Admin session opened");

    Ok(HttpResponse::Ok().json(AdminLoginResponse {
        token,
        expires_in: config.admin_session_ttl,
    }))
}

/// Admin logout
///
/// Always succeeds; a valid admin token is revoked.
#[utoipa::path(
    post,
    path = "/auth/admin/logout",
    responses((status = 204, description = "Admin session closed")),
    tag = "Auth"
)]
#[instrument(name = "auth_admin_logout", skip_all)]
pub async fn admin_logout(
    req: HttpRequest,
    config: web::Data<Config>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let session = bearer_token(req.headers())
        .and_then(|token| authenticate(token, &config.jwt_secret, &state.revoked).ok())
        .filter(|user| user.role() == Role::Admin);

    if let Some(user) = session {
        state.revoked.revoke(&user.claims.jti);
        info!(jti = %user.claims.jti, "Admin session closed");
    }

    HttpResponse::NoContent().finish()
}
