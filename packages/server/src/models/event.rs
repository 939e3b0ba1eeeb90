use chrono::{DateTime, Utc};
use sea_orm::{FromQueryResult, Set};
use serde::{Deserialize, Serialize};

use super::shared::{
    Pagination, empty_as_none, instant, normalize_optional, optional_instant,
    validate_optional_text, validate_text,
};
use crate::entity::{event_occurrence, event_template};
use crate::error::AppError;

pub const EVENTS_PER_PAGE: u64 = 10;

/// `filter=future|past` on the event lists. Anything else means future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeFilter {
    #[default]
    Future,
    Past,
}

impl TimeFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("past") => TimeFilter::Past,
            _ => TimeFilter::Future,
        }
    }
}

/// Query string of the event and survey lists. `name` carries a template id,
/// as the name dropdown is keyed by template.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventListQuery {
    /// `future` (default) or `past`.
    pub filter: Option<String>,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Event template id.
    #[serde(rename = "name", default, deserialize_with = "empty_as_none")]
    pub template_id: Option<i32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub year: Option<i32>,
    /// 1-12.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub month: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<u64>,
    /// Echoed back after a successful registration redirect.
    pub registered: Option<String>,
    /// Echoed back after a rejected registration redirect.
    pub error: Option<String>,
}

/// The filter values as applied, echoed so the client can keep dropdowns
/// selected.
#[derive(Debug, Default, Serialize, utoipa::ToSchema)]
pub struct SelectedFilters {
    pub event_type: Option<String>,
    pub template_id: Option<i32>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct TemplateOption {
    pub id: i32,
    pub name: String,
    pub event_type: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MonthOption {
    #[schema(example = 3)]
    pub value: u32,
    #[schema(example = "March")]
    pub label: String,
}

/// Cascading dropdown options.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FilterOptions {
    pub event_types: Vec<String>,
    /// Narrowed to the selected event type, if any.
    pub templates: Vec<TemplateOption>,
    pub years: Vec<i32>,
    pub months: Vec<MonthOption>,
}

/// An occurrence joined with its template.
#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct OccurrenceItem {
    pub id: i32,
    pub template_id: i32,
    pub name: String,
    pub event_type: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
    pub capacity: Option<i32>,
    pub registration_deadline: Option<DateTime<Utc>>,
}

/// One of the caller's own registrations.
#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct MyEventItem {
    pub registration_id: i32,
    pub registered_at: DateTime<Utc>,
    pub occurrence_id: i32,
    pub name: String,
    pub event_type: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
    pub capacity: Option<i32>,
    pub status: String,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum EventsPage {
    Manager {
        events: Vec<OccurrenceItem>,
        pagination: Pagination,
        filter: TimeFilter,
        selected: SelectedFilters,
        options: FilterOptions,
    },
    Participant {
        events: Vec<MyEventItem>,
        pagination: Pagination,
        filter: TimeFilter,
        registered: Option<String>,
    },
}

/// Upcoming occurrences the caller has not registered for.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BrowsePage {
    pub events: Vec<OccurrenceItem>,
    pub pagination: Pagination,
    pub selected: SelectedFilters,
    pub options: FilterOptions,
    #[schema(example = "already_registered")]
    pub error: Option<String>,
}

/// Body of `POST /events/add` and `POST /events/edit/{id}`.
///
/// Times may be RFC 3339 or `datetime-local` values (`2025-12-17T10:00`),
/// the latter read as UTC.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct OccurrenceForm {
    pub template_id: i32,
    #[serde(deserialize_with = "instant")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "instant")]
    pub end_time: DateTime<Utc>,
    #[schema(example = "Provo Library, Room 2")]
    pub location: String,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default, deserialize_with = "optional_instant")]
    pub registration_deadline: Option<DateTime<Utc>>,
}

pub fn validate_occurrence_form(form: &OccurrenceForm) -> Result<(), AppError> {
    validate_text("Location", &form.location, 200)?;
    if form.end_time <= form.start_time {
        return Err(AppError::Validation(
            "End time must be after start time".into(),
        ));
    }
    if let Some(capacity) = form.capacity
        && capacity < 0
    {
        return Err(AppError::Validation("Capacity cannot be negative".into()));
    }
    if let Some(deadline) = form.registration_deadline
        && deadline > form.start_time
    {
        return Err(AppError::Validation(
            "Registration deadline cannot be after the start time".into(),
        ));
    }
    Ok(())
}

impl OccurrenceForm {
    pub fn apply(self, model: &mut event_occurrence::ActiveModel) {
        model.template_id = Set(self.template_id);
        model.start_time = Set(self.start_time);
        model.end_time = Set(self.end_time);
        model.location = Set(self.location.trim().to_string());
        model.capacity = Set(self.capacity);
        model.registration_deadline = Set(self.registration_deadline);
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OccurrenceResponse {
    pub id: i32,
    pub template_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
    pub capacity: Option<i32>,
    pub registration_deadline: Option<DateTime<Utc>>,
}

impl From<event_occurrence::Model> for OccurrenceResponse {
    fn from(m: event_occurrence::Model) -> Self {
        Self {
            id: m.id,
            template_id: m.template_id,
            start_time: m.start_time,
            end_time: m.end_time,
            location: m.location,
            capacity: m.capacity,
            registration_deadline: m.registration_deadline,
        }
    }
}

/// Data behind the add/edit event forms.
#[derive(Serialize, utoipa::ToSchema)]
pub struct OccurrenceFormPage {
    pub templates: Vec<TemplateResponse>,
    /// Current values when editing.
    pub event: Option<OccurrenceResponse>,
}

/// Body of the template add/edit endpoints.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct TemplateForm {
    #[schema(example = "STEAM Workshop: Robotics")]
    pub name: String,
    #[serde(default)]
    #[schema(example = "STEAM")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub fn validate_template_form(form: &TemplateForm) -> Result<(), AppError> {
    validate_text("Name", &form.name, 200)?;
    validate_optional_text("Event type", form.event_type.as_deref(), 100)?;
    validate_optional_text("Description", form.description.as_deref(), 5000)?;
    Ok(())
}

impl TemplateForm {
    pub fn apply(self, model: &mut event_template::ActiveModel) {
        model.name = Set(self.name.trim().to_string());
        model.event_type = Set(normalize_optional(self.event_type));
        model.description = Set(normalize_optional(self.description));
    }
}

#[derive(Debug, Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct TemplateResponse {
    pub id: i32,
    pub name: String,
    pub event_type: Option<String>,
    pub description: Option<String>,
}

impl From<event_template::Model> for TemplateResponse {
    fn from(m: event_template::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            event_type: m.event_type,
            description: m.description,
        }
    }
}
