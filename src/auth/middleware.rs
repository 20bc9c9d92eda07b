use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    error::ErrorInternalServerError,
    web::Data,
};
use tracing::debug;

use crate::auth::auth::{authenticate, bearer_token};
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::state::AppState;

pub async fn device_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    authorize(req, next, Role::Device).await
}

pub async fn admin_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    authorize(req, next, Role::Admin).await
}

async fn authorize(
    req: ServiceRequest,
    next: Next<BoxBody>,
    role: Role,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| ErrorInternalServerError("App config missing"))?;
    let state = req
        .app_data::<Data<AppState>>()
        .cloned()
        .ok_or_else(|| ErrorInternalServerError("App state missing"))?;

    let verified = match bearer_token(req.headers()) {
        Some(token) => authenticate(token, &config.jwt_secret, &state.revoked),
        None => Err(AppError::Unauthorized("Missing Authorization header".into())),
    }
    .and_then(|user| {
        if user.role() == role {
            Ok(user)
        } else {
            Err(AppError::Forbidden(format!("{role:?} token required")))
        }
    });

    match verified {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.call(req).await
        }
        Err(e) => {
            debug!(path = req.path(), error = %e, "Rejected request");
            let resp = e.error_response();
            Ok(req.into_response(resp))
        }
    }
}
