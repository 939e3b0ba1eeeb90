use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::sea_query::Query as SeaQuery;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{
    event_occurrence, event_template, nps_bucket, nps_rule, participant, registration, survey,
};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, Manager};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::event::SelectedFilters;
use crate::models::survey::*;
use crate::state::AppState;
use crate::utils::event_filter::{EventFilter, YearScope, filter_options};
use crate::utils::listing::{PageRequest, fetch_page};
use crate::utils::nps::{overall_score, resolve_rule_id};
use crate::utils::report::{ScoreRow, summarize};

/// Surveys joined through registration to participant, event and NPS bucket.
/// The bucket joins are left joins since a survey may match no rule.
fn joined_surveys() -> Select<survey::Entity> {
    survey::Entity::find()
        .select_only()
        .join(JoinType::InnerJoin, survey::Relation::Registration.def())
        .join(JoinType::InnerJoin, registration::Relation::Occurrence.def())
        .join(JoinType::InnerJoin, event_occurrence::Relation::Template.def())
        .join(JoinType::InnerJoin, registration::Relation::Participant.def())
        .join(JoinType::LeftJoin, survey::Relation::NpsRule.def())
        .join(JoinType::LeftJoin, nps_rule::Relation::Bucket.def())
}

fn survey_items(select: Select<survey::Entity>) -> Select<survey::Entity> {
    select
        .column(survey::Column::Id)
        .column(survey::Column::RegistrationId)
        .column(registration::Column::ParticipantId)
        .column(participant::Column::FirstName)
        .column(participant::Column::LastName)
        .column_as(event_template::Column::Name, "event_name")
        .column(event_template::Column::EventType)
        .column(event_occurrence::Column::StartTime)
        .column(survey::Column::Satisfaction)
        .column(survey::Column::Usefulness)
        .column(survey::Column::Instructor)
        .column(survey::Column::Recommendation)
        .column(survey::Column::Overall)
        .column_as(nps_bucket::Column::Name, "bucket")
        .column(survey::Column::Comments)
        .column(survey::Column::SubmittedAt)
}

fn score_rows(select: Select<survey::Entity>) -> Select<survey::Entity> {
    select
        .column(survey::Column::Satisfaction)
        .column(survey::Column::Usefulness)
        .column(survey::Column::Instructor)
        .column(survey::Column::Recommendation)
        .column(survey::Column::Overall)
        .column_as(nps_bucket::Column::Name, "bucket")
}

async fn find_survey_item<C: ConnectionTrait>(db: &C, id: i32) -> Result<SurveyItem, AppError> {
    survey_items(joined_surveys())
        .filter(survey::Column::Id.eq(id))
        .into_model::<SurveyItem>()
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Survey not found".into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Surveys",
    operation_id = "listSurveys",
    summary = "List survey responses",
    description = "Managers get responses filtered by event type, template, year and month (12 per page), aggregate averages with an NPS breakdown over the filtered set, the unfiltered total and cascading filter options. Other users get their pending and completed surveys.",
    params(SurveyListQuery),
    responses(
        (status = 200, description = "Surveys page", body = SurveysPage),
        (status = 400, description = "Invalid filter (VALIDATION_ERROR)", body = ErrorBody),
        (status = 303, description = "Not logged in, redirect to /login"),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn list_surveys(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SurveyListQuery>,
) -> Result<Json<SurveysPage>, AppError> {
    if !auth_user.is_manager() {
        let Some(pid) = auth_user.participant_id else {
            return Ok(Json(SurveysPage::Participant {
                pending: Vec::new(),
                completed: Vec::new(),
            }));
        };

        let pending = registration::Entity::find()
            .select_only()
            .column_as(registration::Column::Id, "registration_id")
            .column_as(event_occurrence::Column::Id, "occurrence_id")
            .column_as(event_template::Column::Name, "event_name")
            .column(event_template::Column::EventType)
            .column(event_occurrence::Column::StartTime)
            .column(event_occurrence::Column::Location)
            .join(JoinType::InnerJoin, registration::Relation::Occurrence.def())
            .join(JoinType::InnerJoin, event_occurrence::Relation::Template.def())
            .filter(registration::Column::ParticipantId.eq(pid))
            .filter(event_occurrence::Column::StartTime.lt(Utc::now()))
            .filter(
                registration::Column::Id.not_in_subquery(
                    SeaQuery::select()
                        .column(survey::Column::RegistrationId)
                        .from(survey::Entity)
                        .to_owned(),
                ),
            )
            .order_by_desc(event_occurrence::Column::StartTime)
            .into_model::<PendingSurvey>()
            .all(&state.db)
            .await?;

        let completed = survey_items(joined_surveys())
            .filter(registration::Column::ParticipantId.eq(pid))
            .order_by_desc(event_occurrence::Column::StartTime)
            .into_model::<SurveyItem>()
            .all(&state.db)
            .await?;

        return Ok(Json(SurveysPage::Participant { pending, completed }));
    }

    let filter = EventFilter::new(query.event_type, query.template_id, query.year, query.month)?;
    let condition = filter.condition(&state.db).await?;
    let page = PageRequest::new(query.page, SURVEYS_PER_PAGE);

    let select = survey_items(joined_surveys())
        .filter(condition.clone())
        .order_by_desc(event_occurrence::Column::StartTime)
        .order_by_desc(survey::Column::Id);
    let (surveys, pagination) = fetch_page(&state.db, select, &page).await?;

    let scores = score_rows(joined_surveys())
        .filter(condition)
        .into_model::<ScoreRow>()
        .all(&state.db)
        .await?;
    let total_count = survey::Entity::find().count(&state.db).await?;
    let options = filter_options(&state.db, filter.event_type.as_deref(), YearScope::All).await?;

    Ok(Json(SurveysPage::Manager {
        surveys,
        pagination,
        stats: summarize(&scores, total_count),
        selected: SelectedFilters {
            event_type: filter.event_type,
            template_id: filter.template_id,
            year: filter.dates.year,
            month: filter.dates.month,
        },
        options,
    }))
}

#[utoipa::path(
    post,
    path = "/submit/{registration_id}",
    tag = "Surveys",
    operation_id = "submitSurvey",
    summary = "Submit a post-event survey",
    description = "The registration must belong to the caller and its event must have started. One survey per registration. The overall score and NPS rule are derived on insert.",
    params(("registration_id" = i32, Path, description = "Registration ID")),
    request_body = SubmitSurveyRequest,
    responses(
        (status = 201, description = "Survey stored", body = SurveyItem),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Registration not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Survey already submitted (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, registration_id))]
pub async fn submit_survey(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(registration_id): Path<i32>,
    AppJson(payload): AppJson<SubmitSurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let participant_id = auth_user.require_participant()?;
    validate_submit_survey(&payload)?;

    let txn = state.db.begin().await?;
    let (_, occurrence) = registration::Entity::find_by_id(registration_id)
        .filter(registration::Column::ParticipantId.eq(participant_id))
        .find_also_related(event_occurrence::Entity)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Registration not found".into()))?;
    let occurrence =
        occurrence.ok_or_else(|| AppError::NotFound("Registration not found".into()))?;

    let now = Utc::now();
    if occurrence.start_time > now {
        return Err(AppError::Validation(
            "Surveys open once the event has started".into(),
        ));
    }

    let existing = survey::Entity::find()
        .filter(survey::Column::RegistrationId.eq(registration_id))
        .count(&txn)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict(
            "A survey was already submitted for this registration".into(),
        ));
    }

    let overall = overall_score(
        payload.satisfaction,
        payload.usefulness,
        payload.instructor,
        payload.recommendation,
    );
    let nps_rule_id = resolve_rule_id(&txn, payload.recommendation).await?;

    let created = survey::ActiveModel {
        registration_id: Set(registration_id),
        satisfaction: Set(payload.satisfaction),
        usefulness: Set(payload.usefulness),
        instructor: Set(payload.instructor),
        recommendation: Set(payload.recommendation),
        overall: Set(overall),
        nps_rule_id: Set(nps_rule_id),
        comments: Set(payload
            .comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())),
        submitted_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(
            "A survey was already submitted for this registration".into(),
        ),
        _ => AppError::from(e),
    })?;
    txn.commit().await?;

    tracing::info!(
        survey_id = created.id,
        participant_id,
        overall,
        nps_rule_id,
        "Survey submitted"
    );

    let item = find_survey_item(&state.db, created.id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    get,
    path = "/view/{id}",
    tag = "Surveys",
    operation_id = "viewSurvey",
    summary = "View one survey response",
    description = "Manager only.",
    params(("id" = i32, Path, description = "Survey ID")),
    responses(
        (status = 200, description = "Survey", body = SurveyItem),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state), fields(id))]
pub async fn view_survey(
    Manager(_): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SurveyItem>, AppError> {
    Ok(Json(find_survey_item(&state.db, id).await?))
}

#[utoipa::path(
    post,
    path = "/delete/{id}",
    tag = "Surveys",
    operation_id = "deleteSurvey",
    summary = "Delete a survey response",
    description = "Manager only. The registration stays, so the participant can submit again.",
    params(("id" = i32, Path, description = "Survey ID")),
    responses(
        (status = 204, description = "Survey deleted"),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_survey(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let result = survey::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Survey not found".into()));
    }
    tracing::info!(survey_id = id, by = auth_user.user_id, "Survey deleted");

    Ok(StatusCode::NO_CONTENT)
}
