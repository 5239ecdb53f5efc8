use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::Modify;

use super::error::ApiError;
use super::AppState;
use crate::auth::cookie::{session_from_header, SESSION_COOKIE};
use crate::auth::SessionUser;

/// JSON body whose rejections are reported as 400 with an `{error}` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// The caller's login session, if any. Never rejects an anonymous caller.
pub struct CurrentUser {
    pub session_id: Option<String>,
    pub user: Option<SessionUser>,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session_id = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| session_from_header(&state.config.session_key, header));
        let Some(session_id) = session_id else {
            return Ok(Self {
                session_id: None,
                user: None,
            });
        };
        match state.auth.lookup(&session_id).await? {
            Some(user) => Ok(Self {
                session_id: Some(session_id),
                user: Some(user),
            }),
            None => Ok(Self {
                session_id: None,
                user: None,
            }),
        }
    }
}

/// Any logged-in caller, or 401.
pub struct RequireUser(pub SessionUser);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        CurrentUser::from_request_parts(parts, state)
            .await?
            .user
            .map(Self)
            .ok_or_else(ApiError::unauthenticated)
    }
}

/// A logged-in admin, or 401.
pub struct RequireAdmin(pub SessionUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await?.user {
            Some(user) if user.is_admin => Ok(Self(user)),
            _ => Err(ApiError::unauthenticated()),
        }
    }
}

pub(super) struct OpenAPIAuth;

impl Modify for OpenAPIAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(schema) = openapi.components.as_mut() {
            schema.add_security_scheme(
                "Session",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
            );
        }
    }
}
