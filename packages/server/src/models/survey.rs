use chrono::{DateTime, Utc};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

use super::event::{FilterOptions, SelectedFilters};
use super::shared::{Pagination, empty_as_none, validate_optional_text};
use crate::error::AppError;
use crate::utils::report::SurveyStats;

pub const SURVEYS_PER_PAGE: u64 = 12;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SurveyListQuery {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Event template id.
    #[serde(rename = "name", default, deserialize_with = "empty_as_none")]
    pub template_id: Option<i32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub month: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<u64>,
}

/// Body of `POST /surveys/submit/{registration_id}`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SubmitSurveyRequest {
    /// 1-5.
    #[schema(example = 5)]
    pub satisfaction: i32,
    /// 1-5.
    #[schema(example = 4)]
    pub usefulness: i32,
    /// 1-5.
    #[schema(example = 4)]
    pub instructor: i32,
    /// 0-10, drives the NPS bucket.
    #[schema(example = 9)]
    pub recommendation: i32,
    #[serde(default)]
    #[schema(example = "Loved the robotics kits!")]
    pub comments: Option<String>,
}

fn check_range(field: &str, value: i32, min: i32, max: i32) -> Result<(), AppError> {
    if !(min..=max).contains(&value) {
        return Err(AppError::Validation(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(())
}

pub fn validate_submit_survey(payload: &SubmitSurveyRequest) -> Result<(), AppError> {
    check_range("Satisfaction", payload.satisfaction, 1, 5)?;
    check_range("Usefulness", payload.usefulness, 1, 5)?;
    check_range("Instructor", payload.instructor, 1, 5)?;
    check_range("Recommendation", payload.recommendation, 0, 10)?;
    validate_optional_text("Comments", payload.comments.as_deref(), 2000)?;
    Ok(())
}

/// A survey joined with its participant, event and NPS bucket.
#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct SurveyItem {
    pub id: i32,
    pub registration_id: i32,
    pub participant_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub event_name: String,
    pub event_type: Option<String>,
    pub start_time: DateTime<Utc>,
    pub satisfaction: i32,
    pub usefulness: i32,
    pub instructor: i32,
    pub recommendation: i32,
    pub overall: i32,
    #[schema(example = "Promoter")]
    pub bucket: Option<String>,
    pub comments: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// A past registration still waiting for its survey.
#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct PendingSurvey {
    pub registration_id: i32,
    pub occurrence_id: i32,
    pub event_name: String,
    pub event_type: Option<String>,
    pub start_time: DateTime<Utc>,
    pub location: String,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum SurveysPage {
    Manager {
        surveys: Vec<SurveyItem>,
        pagination: Pagination,
        stats: SurveyStats,
        selected: SelectedFilters,
        options: FilterOptions,
    },
    Participant {
        pending: Vec<PendingSurvey>,
        completed: Vec<SurveyItem>,
    },
}
