use chrono::NaiveDate;
use sea_orm::{FromQueryResult, Set};
use serde::{Deserialize, Serialize};

use super::participant::ParticipantOption;
use super::shared::{Pagination, empty_as_none, validate_text};
use crate::entity::milestone;
use crate::error::AppError;

pub const MILESTONES_PER_PAGE: u64 = 12;

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MilestoneListQuery {
    /// Matches the participant's first or last name or the milestone title.
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<u64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct MilestoneForm {
    #[schema(example = "Graduated high school")]
    pub title: String,
    #[schema(example = "2025-05-30")]
    pub date: NaiveDate,
    pub participant_id: i32,
}

pub fn validate_milestone_form(form: &MilestoneForm) -> Result<(), AppError> {
    validate_text("Title", &form.title, 200)
}

impl MilestoneForm {
    pub fn apply(self, model: &mut milestone::ActiveModel) {
        model.title = Set(self.title.trim().to_string());
        model.date = Set(self.date);
        model.participant_id = Set(self.participant_id);
    }
}

#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct MilestoneItem {
    pub id: i32,
    pub title: String,
    pub date: NaiveDate,
    pub participant_id: i32,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MilestoneResponse {
    pub id: i32,
    pub title: String,
    pub date: NaiveDate,
    pub participant_id: i32,
}

impl From<milestone::Model> for MilestoneResponse {
    fn from(m: milestone::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            date: m.date,
            participant_id: m.participant_id,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum MilestonesPage {
    Manager {
        milestones: Vec<MilestoneItem>,
        pagination: Pagination,
        search: Option<String>,
    },
    Participant {
        milestones: Vec<MilestoneResponse>,
    },
}

/// Data behind the add/edit milestone forms.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MilestoneFormPage {
    pub participants: Vec<ParticipantOption>,
    pub milestone: Option<MilestoneResponse>,
}
