use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use sea_orm::{EntityTrait, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::entity::app_user;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Authorization level stored in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum RoleLevel {
    /// Full access to every management route.
    #[serde(rename = "M")]
    Manager,
    /// Regular participant account.
    #[serde(rename = "U")]
    User,
}

impl RoleLevel {
    /// Level granted at login for a participant role flag.
    pub fn from_participant_role(role: Option<&str>) -> Self {
        match role {
            Some(crate::entity::participant::ROLE_ADMIN) => RoleLevel::Manager,
            _ => RoleLevel::User,
        }
    }
}

/// Logged-in account as carried by the session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub level: RoleLevel,
    pub participant_id: Option<i32>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub session_epoch: i32,
}

impl AuthUser {
    pub fn is_manager(&self) -> bool {
        self.level == RoleLevel::Manager
    }

    /// Returns `Ok(())` for managers, `Err(PermissionDenied)` otherwise.
    pub fn require_manager(&self) -> Result<(), AppError> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    /// The participant linked to this account, required for self-service
    /// actions such as registering for an event.
    pub fn require_participant(&self) -> Result<i32, AppError> {
        self.participant_id.ok_or_else(|| {
            AppError::Validation("This account is not linked to a participant".into())
        })
    }
}

impl From<jwt::Claims> for AuthUser {
    fn from(claims: jwt::Claims) -> Self {
        Self {
            user_id: claims.uid,
            username: claims.sub,
            level: claims.level,
            participant_id: claims.pid,
            first_name: claims.first_name,
            last_name: claims.last_name,
            session_epoch: claims.epoch,
        }
    }
}

/// Per-request session state.
///
/// A missing, malformed or expired token is simply `Anonymous`, as is a
/// token issued before the account last logged out. Only database errors
/// reject. Use [`AuthUser`] as the extractor on routes that need a login.
#[derive(Debug, Clone)]
pub enum Session {
    Anonymous,
    Authenticated(AuthUser),
}

impl Session {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated(user) => Some(user),
        }
    }
}

/// Token from `Authorization: Bearer <token>`, falling back to the session
/// cookie.
fn session_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    let bearer = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(&parts.headers)
            .get(cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    })
}

impl<S> FromRequestParts<S> for Session
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let auth = &state.config.auth;

        let Some(token) = session_token(parts, &auth.cookie_name) else {
            return Ok(Session::Anonymous);
        };

        let claims = match jwt::verify(&token, &auth.jwt_secret) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Discarding invalid session token: {}", e);
                return Ok(Session::Anonymous);
            }
        };

        let current: Option<i32> = app_user::Entity::find_by_id(claims.uid)
            .select_only()
            .column(app_user::Column::SessionEpoch)
            .into_tuple()
            .one(&state.db)
            .await?;
        if current != Some(claims.epoch) {
            tracing::debug!(user_id = claims.uid, "Discarding revoked session token");
            return Ok(Session::Anonymous);
        }

        Ok(Session::Authenticated(claims.into()))
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Session::from_request_parts(parts, state).await? {
            Session::Authenticated(user) => Ok(user),
            Session::Anonymous => Err(AppError::LoginRequired),
        }
    }
}

/// Logged-in manager. Rejects before the request body is read, so callers
/// without the manager level get 403 whatever they sent.
#[derive(Debug, Clone)]
pub struct Manager(pub AuthUser);

impl<S> FromRequestParts<S> for Manager
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_manager()?;
        Ok(Manager(user))
    }
}
