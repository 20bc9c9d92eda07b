use std::time::Duration;

use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, http::header::HeaderMap};
use futures::future::{Ready, ready};
use moka::sync::Cache;

use crate::auth::jwt::{Claims, verify_token};
use crate::error::AppError;
use crate::model::{identity::UserId, role::Role};

/// Verified bearer of a token, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
}

impl AuthUser {
    pub fn role(&self) -> Role {
        self.claims.role
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Verifies a token and checks it has not been revoked.
pub fn authenticate(token: &str, secret: &str, revoked: &RevokedTokens) -> Result<AuthUser, AppError> {
    let claims = verify_token(token, secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;
    if revoked.contains(&claims.jti) {
        return Err(AppError::Unauthorized("Session has ended".into()));
    }
    Ok(AuthUser { claims })
}

fn from_extensions(req: &HttpRequest) -> Result<AuthUser, AppError> {
    req.extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))
}

/// The anonymous device identity behind the request.
#[derive(Debug, Clone, Copy)]
pub struct DeviceIdentity(pub UserId);

impl FromRequest for DeviceIdentity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(from_extensions(req).and_then(|user| {
            if user.role() != Role::Device {
                return Err(AppError::Forbidden("Device identity required".into()));
            }
            user.claims
                .sub
                .parse()
                .map(DeviceIdentity)
                .map_err(|_| AppError::Unauthorized("Invalid identity".into()))
        }))
    }
}

/// An unlocked admin session.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Claims);

impl FromRequest for AdminSession {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(from_extensions(req).and_then(|user| match user.role() {
            Role::Admin => Ok(AdminSession(user.claims)),
            Role::Device => Err(AppError::Forbidden("Admin only".into())),
        }))
    }
}

/// Token ids ended by logout, remembered until they would have expired anyway.
#[derive(Clone)]
pub struct RevokedTokens {
    jtis: Cache<String, ()>,
}

impl RevokedTokens {
    pub fn new(retention: Duration) -> Self {
        Self {
            jtis: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(retention)
                .build(),
        }
    }

    #[cfg(test)]
    pub(crate) fn retention(&self) -> Option<Duration> {
        self.jtis.policy().time_to_live()
    }

    pub fn revoke(&self, jti: &str) {
        self.jtis.insert(jti.to_string(), ());
    }

    pub fn contains(&self, jti: &str) -> bool {
        self.jtis.contains_key(jti)
    }
}
