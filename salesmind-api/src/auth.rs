//! Caller identity
//!
//! Authentication happens upstream; the gateway forwards the verified
//! identity as `X-User-Id`, `X-Tenant-Id` and `X-User-Role` headers.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;
use crate::models::Role;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
    pub tenant_id: i64,
    pub role: Role,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", name)))
}

fn id_header(parts: &Parts, name: &str) -> Result<i64, ApiError> {
    header(parts, name)?
        .parse()
        .map_err(|_| ApiError::Unauthorized(format!("Invalid {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AuthContext {
            user_id: id_header(parts, USER_ID_HEADER)?,
            tenant_id: id_header(parts, TENANT_ID_HEADER)?,
            role: header(parts, ROLE_HEADER)?
                .parse()
                .map_err(ApiError::Unauthorized)?,
        })
    }
}
