use serde::{Deserialize, Serialize};

use super::participant::{ParticipantForm, validate_participant_form};
use crate::error::AppError;
use crate::extractors::auth::{AuthUser, RoleLevel};

/// Usernames: 1-32 chars, alphanumeric plus `_`, `.` and `-`.
pub fn validate_username(username: &str) -> Result<(), AppError> {
    let username = username.trim();
    if username.is_empty() || username.chars().count() > 32 {
        return Err(AppError::Validation(
            "Username must be 1-32 characters".into(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AppError::Validation(
            "Username must contain only letters, digits, '.', '-' and '_'".into(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 8 || password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be 8-128 characters".into(),
        ));
    }
    Ok(())
}

/// Request body for login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[schema(example = "sofia.garcia")]
    pub username: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::Validation("Username must not be empty".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// Self sign-up: a new participant profile plus the account that logs into
/// it. The participant role is always `participant`.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    #[schema(example = "sofia.garcia")]
    pub username: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    #[serde(flatten)]
    pub participant: ParticipantForm,
}

pub fn validate_signup_request(payload: &SignupRequest) -> Result<(), AppError> {
    validate_username(&payload.username)?;
    validate_password(&payload.password)?;
    validate_participant_form(&payload.participant)
}

/// The session as seen by clients.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SessionUser {
    #[schema(example = 7)]
    pub user_id: i32,
    #[schema(example = "sofia.garcia")]
    pub username: String,
    pub level: RoleLevel,
    #[schema(example = 12)]
    pub participant_id: Option<i32>,
    #[schema(example = "Sofia")]
    pub first_name: Option<String>,
    #[schema(example = "Garcia")]
    pub last_name: Option<String>,
}

impl From<AuthUser> for SessionUser {
    fn from(user: AuthUser) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            level: user.level,
            participant_id: user.participant_id,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// Returned by login and sign-up. The token is also set as the session
/// cookie.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    pub user: SessionUser,
}

/// What the login page needs to render.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginPage {
    #[schema(example = "/login")]
    pub login_path: &'static str,
    #[schema(example = "/signup")]
    pub signup_path: &'static str,
}

/// Counts shown on the manager dashboard.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ManagerSummary {
    pub participants: u64,
    pub upcoming_events: u64,
    pub survey_responses: u64,
    #[schema(example = 1250.5)]
    pub donations_total: f64,
}

/// Counts shown on a participant's dashboard.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ParticipantSummary {
    pub upcoming_registrations: u64,
    pub pending_surveys: u64,
    pub milestones: u64,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum HomePage {
    /// Public landing for anonymous visitors.
    Landing {
        organization: &'static str,
        login_path: &'static str,
        donate_path: &'static str,
    },
    Manager {
        user: SessionUser,
        summary: ManagerSummary,
    },
    Participant {
        user: SessionUser,
        summary: Option<ParticipantSummary>,
    },
}
