use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{FromQueryResult, Set};
use serde::{Deserialize, Serialize};

use super::shared::{
    Pagination, empty_as_none, normalize_optional, validate_email, validate_optional_text,
    validate_text,
};
use crate::entity::participant;
use crate::error::AppError;

pub const PARTICIPANTS_PER_PAGE: u64 = 12;

/// Participant profile fields, shared by the participant forms, self
/// sign-up and user creation with a new participant.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ParticipantForm {
    #[schema(example = "Sofia")]
    pub first_name: String,
    #[schema(example = "Garcia")]
    pub last_name: String,
    #[schema(example = "sofia@example.org")]
    pub email: String,
    #[serde(default)]
    #[schema(example = "2009-04-18")]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub school_or_employer: Option<String>,
    #[serde(default)]
    pub field_of_interest: Option<String>,
    /// `admin` or `participant`. Defaults to `participant`.
    #[serde(default)]
    #[schema(example = "participant")]
    pub role: Option<String>,
}

/// Accepts only the two known roles. `None` and blank mean the default.
pub fn normalize_role(role: Option<&str>) -> Result<&'static str, AppError> {
    match role.map(str::trim) {
        None | Some("") => Ok(participant::ROLE_PARTICIPANT),
        Some(r) if r.eq_ignore_ascii_case(participant::ROLE_PARTICIPANT) => {
            Ok(participant::ROLE_PARTICIPANT)
        }
        Some(r) if r.eq_ignore_ascii_case(participant::ROLE_ADMIN) => Ok(participant::ROLE_ADMIN),
        Some(_) => Err(AppError::Validation(
            "Role must be 'admin' or 'participant'".into(),
        )),
    }
}

pub fn validate_participant_form(form: &ParticipantForm) -> Result<(), AppError> {
    validate_text("First name", &form.first_name, 100)?;
    validate_text("Last name", &form.last_name, 100)?;
    validate_email(&form.email)?;
    if let Some(dob) = form.dob
        && dob > Utc::now().date_naive()
    {
        return Err(AppError::Validation(
            "Date of birth cannot be in the future".into(),
        ));
    }
    validate_optional_text("Phone", form.phone.as_deref(), 30)?;
    validate_optional_text("City", form.city.as_deref(), 100)?;
    validate_optional_text("State", form.state.as_deref(), 50)?;
    validate_optional_text("Zip", form.zip.as_deref(), 20)?;
    validate_optional_text(
        "School or employer",
        form.school_or_employer.as_deref(),
        200,
    )?;
    validate_optional_text("Field of interest", form.field_of_interest.as_deref(), 200)?;
    normalize_role(form.role.as_deref())?;
    Ok(())
}

impl ParticipantForm {
    /// Copy the form onto `model`. Call [`validate_participant_form`] first.
    pub fn apply(self, model: &mut participant::ActiveModel) -> Result<(), AppError> {
        let role = normalize_role(self.role.as_deref())?;
        model.first_name = Set(self.first_name.trim().to_string());
        model.last_name = Set(self.last_name.trim().to_string());
        model.email = Set(self.email.trim().to_lowercase());
        model.dob = Set(self.dob);
        model.phone = Set(normalize_optional(self.phone));
        model.city = Set(normalize_optional(self.city));
        model.state = Set(normalize_optional(self.state));
        model.zip = Set(normalize_optional(self.zip));
        model.school_or_employer = Set(normalize_optional(self.school_or_employer));
        model.field_of_interest = Set(normalize_optional(self.field_of_interest));
        model.role = Set(role.to_string());
        Ok(())
    }

    /// A fresh row for insertion.
    pub fn into_active_model(self) -> Result<participant::ActiveModel, AppError> {
        let mut model = participant::ActiveModel {
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        self.apply(&mut model)?;
        Ok(model)
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ParticipantListQuery {
    /// Matches first name, last name, email or city.
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<u64>,
}

#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct ParticipantResponse {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub school_or_employer: Option<String>,
    pub field_of_interest: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<participant::Model> for ParticipantResponse {
    fn from(p: participant::Model) -> Self {
        Self {
            id: p.id,
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            dob: p.dob,
            phone: p.phone,
            city: p.city,
            state: p.state,
            zip: p.zip,
            school_or_employer: p.school_or_employer,
            field_of_interest: p.field_of_interest,
            role: p.role,
            created_at: p.created_at,
        }
    }
}

/// Name-only projection used to fill participant dropdowns.
#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct ParticipantOption {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ParticipantFormPage {
    #[schema(example = json!(["participant", "admin"]))]
    pub roles: Vec<&'static str>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ParticipantsPage {
    Manager {
        participants: Vec<ParticipantResponse>,
        pagination: Pagination,
        search: Option<String>,
    },
    /// A participant only ever sees their own profile.
    Profile {
        participant: Option<ParticipantResponse>,
    },
}
