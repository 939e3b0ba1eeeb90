use chrono::{DateTime, Utc};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Deserializer, Serialize};

use super::participant::{ParticipantForm, ParticipantOption, normalize_role};
use super::shared::{Pagination, empty_as_none};
use crate::error::AppError;

pub const USERS_PER_PAGE: u64 = 12;

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Matches username or the linked participant's name or email.
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<u64>,
}

/// Which participant a new account links to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParticipantLink {
    #[default]
    None,
    Existing(i32),
    /// Create the participant from the request's `participant` fields.
    New,
}

/// Accepts an integer id, the string `"new"`, a numeric string, or
/// null/absent/blank.
fn deserialize_link<'de, D>(deserializer: D) -> Result<ParticipantLink, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Id(i32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(ParticipantLink::None),
        Some(Raw::Id(id)) => Ok(ParticipantLink::Existing(id)),
        Some(Raw::Text(s)) => match s.trim() {
            "" => Ok(ParticipantLink::None),
            t if t.eq_ignore_ascii_case("new") => Ok(ParticipantLink::New),
            t => t
                .parse()
                .map(ParticipantLink::Existing)
                .map_err(|_| serde::de::Error::custom("participant_id must be an id or \"new\"")),
        },
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "isabella.m")]
    pub username: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    /// Existing participant id, `"new"`, or absent.
    #[serde(default, deserialize_with = "deserialize_link")]
    #[schema(value_type = Option<String>, example = "new")]
    pub participant_id: ParticipantLink,
    /// Required when `participant_id` is `"new"`.
    #[serde(default)]
    pub participant: Option<ParticipantForm>,
}

pub fn validate_create_user(payload: &CreateUserRequest) -> Result<(), AppError> {
    super::auth::validate_username(&payload.username)?;
    super::auth::validate_password(&payload.password)?;
    if payload.participant_id == ParticipantLink::New {
        let form = payload.participant.as_ref().ok_or_else(|| {
            AppError::Validation(
                "First name, last name, and email are required for new participants".into(),
            )
        })?;
        super::participant::validate_participant_form(form)?;
    }
    Ok(())
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    pub username: String,
    /// Left unchanged when absent or blank.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub participant_id: Option<i32>,
    /// Role written to the linked participant. Defaults to `participant`.
    #[serde(default)]
    #[schema(example = "admin")]
    pub participant_role: Option<String>,
}

impl UpdateUserRequest {
    pub fn new_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.trim().is_empty())
    }
}

pub fn validate_update_user(payload: &UpdateUserRequest) -> Result<(), AppError> {
    super::auth::validate_username(&payload.username)?;
    if let Some(password) = payload.new_password() {
        super::auth::validate_password(password)?;
    }
    normalize_role(payload.participant_role.as_deref())?;
    Ok(())
}

#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct UserItem {
    pub id: i32,
    pub username: String,
    pub participant_id: Option<i32>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserItem>,
    pub pagination: Pagination,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub participant_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<crate::entity::app_user::Model> for UserResponse {
    fn from(u: crate::entity::app_user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            participant_id: u.participant_id,
            created_at: u.created_at,
        }
    }
}

/// Data behind the add user form: participants without an account.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AddUserPage {
    pub participants: Vec<ParticipantOption>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EditUserPage {
    pub user: UserItem,
    pub participants: Vec<ParticipantOption>,
}
