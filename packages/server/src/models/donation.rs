use chrono::{NaiveDate, Utc};
use sea_orm::{FromQueryResult, Set};
use serde::{Deserialize, Serialize};

use super::participant::ParticipantOption;
use super::shared::{Pagination, empty_as_none};
use crate::entity::donation;
use crate::error::AppError;

pub const DONATIONS_PER_PAGE: u64 = 12;
pub const SUPPORTERS_PER_PAGE: u64 = 20;

/// Largest single donation accepted.
pub const MAX_DONATION: f64 = 1_000_000_000.0;

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DonationListQuery {
    /// Managers: donor first/last name or email. Participants: supporter
    /// first/last name.
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<u64>,
}

/// Body of the manager add/edit endpoints.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct DonationForm {
    #[schema(example = 50.0)]
    pub amount: f64,
    /// Defaults to today on add.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Absent for anonymous donations.
    #[serde(default)]
    pub participant_id: Option<i32>,
}

/// Body of `POST /donations/public`. The donor is the session's
/// participant when logged in, otherwise anonymous.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PublicDonationRequest {
    #[schema(example = 25.0)]
    pub amount: f64,
}

pub fn validate_amount(amount: f64) -> Result<(), AppError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::Validation(
            "Donation amount must be greater than zero".into(),
        ));
    }
    if amount > MAX_DONATION {
        return Err(AppError::Validation("Donation amount is too large".into()));
    }
    Ok(())
}

pub fn validate_donation_form(form: &DonationForm) -> Result<(), AppError> {
    validate_amount(form.amount)
}

/// Amounts are stored to the cent.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

impl DonationForm {
    pub fn apply(self, model: &mut donation::ActiveModel) {
        model.amount = Set(round_cents(self.amount));
        model.date = Set(self.date);
        model.participant_id = Set(self.participant_id);
    }

    /// A fresh row, dated today unless a date was given.
    pub fn into_active_model(mut self) -> donation::ActiveModel {
        let today = Utc::now().date_naive();
        self.date = Some(self.date.unwrap_or(today));
        let mut model = donation::ActiveModel {
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        self.apply(&mut model);
        model
    }
}

#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct DonationItem {
    pub id: i32,
    pub amount: f64,
    pub date: Option<NaiveDate>,
    pub participant_id: Option<i32>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DonationResponse {
    pub id: i32,
    pub amount: f64,
    pub date: Option<NaiveDate>,
    pub participant_id: Option<i32>,
}

impl From<donation::Model> for DonationResponse {
    fn from(m: donation::Model) -> Self {
        Self {
            id: m.id,
            amount: m.amount,
            date: m.date,
            participant_id: m.participant_id,
        }
    }
}

/// One row per donor with their most recent donation date. Anonymous
/// donations group into a single row with no participant.
#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct SupporterItem {
    pub participant_id: Option<i32>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub latest_donation: Option<NaiveDate>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DonationsPage {
    Manager {
        donations: Vec<DonationItem>,
        pagination: Pagination,
        /// Sum over every donation, ignoring search and paging.
        total_amount: f64,
        search: Option<String>,
    },
    Participant {
        my_donations: Vec<DonationResponse>,
        supporters: Vec<SupporterItem>,
        pagination: Pagination,
        search: Option<String>,
    },
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DonationFormPage {
    pub participants: Vec<ParticipantOption>,
    pub donation: Option<DonationResponse>,
}
