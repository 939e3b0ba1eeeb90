use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::sea_query::IntoColumnRef;
use sea_orm::*;
use tracing::instrument;

use super::participant::{find_participant, participant_options};
use crate::entity::{milestone, participant};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, Manager};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::milestone::*;
use crate::state::AppState;
use crate::utils::listing::{PageRequest, fetch_page, search_condition};

async fn find_milestone<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<milestone::Model, AppError> {
    milestone::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Milestone not found".into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Milestones",
    operation_id = "listMilestones",
    summary = "List milestones",
    description = "Managers get every milestone, newest first, searchable by participant name or title (12 per page). Other users get their own milestones.",
    params(MilestoneListQuery),
    responses(
        (status = 200, description = "Milestones page", body = MilestonesPage),
        (status = 303, description = "Not logged in, redirect to /login"),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn list_milestones(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<MilestoneListQuery>,
) -> Result<Json<MilestonesPage>, AppError> {
    if !auth_user.is_manager() {
        let milestones = match auth_user.participant_id {
            Some(pid) => milestone::Entity::find()
                .filter(milestone::Column::ParticipantId.eq(pid))
                .order_by_desc(milestone::Column::Date)
                .order_by_desc(milestone::Column::Id)
                .all(&state.db)
                .await?
                .into_iter()
                .map(MilestoneResponse::from)
                .collect(),
            None => Vec::new(),
        };
        return Ok(Json(MilestonesPage::Participant { milestones }));
    }

    let page = PageRequest::new(query.page, MILESTONES_PER_PAGE);
    let mut select = milestone::Entity::find()
        .select_only()
        .column(milestone::Column::Id)
        .column(milestone::Column::Title)
        .column(milestone::Column::Date)
        .column(milestone::Column::ParticipantId)
        .column(participant::Column::FirstName)
        .column(participant::Column::LastName)
        .join(JoinType::InnerJoin, milestone::Relation::Participant.def());
    if let Some(cond) = search_condition(
        query.search.as_deref(),
        [
            (participant::Entity, participant::Column::FirstName).into_column_ref(),
            (participant::Entity, participant::Column::LastName).into_column_ref(),
            (milestone::Entity, milestone::Column::Title).into_column_ref(),
        ],
    ) {
        select = select.filter(cond);
    }
    let select = select
        .order_by_desc(milestone::Column::Date)
        .order_by_desc(milestone::Column::Id);

    let (milestones, pagination) = fetch_page(&state.db, select, &page).await?;

    Ok(Json(MilestonesPage::Manager {
        milestones,
        pagination,
        search: query.search,
    }))
}

#[utoipa::path(
    get,
    path = "/add",
    tag = "Milestones",
    operation_id = "addMilestoneForm",
    summary = "Milestone add form",
    description = "Manager only. Lists the participants a milestone can be recorded for.",
    responses(
        (status = 200, description = "Form data", body = MilestoneFormPage),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state))]
pub async fn add_milestone_form(
    Manager(_): Manager,
    State(state): State<AppState>,
) -> Result<Json<MilestoneFormPage>, AppError> {
    Ok(Json(MilestoneFormPage {
        participants: participant_options(&state.db).await?,
        milestone: None,
    }))
}

#[utoipa::path(
    post,
    path = "/add",
    tag = "Milestones",
    operation_id = "createMilestone",
    summary = "Record a milestone",
    description = "Manager only.",
    request_body = MilestoneForm,
    responses(
        (status = 201, description = "Milestone created", body = MilestoneResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Participant not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(participant_id = payload.participant_id))]
pub async fn create_milestone(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    AppJson(payload): AppJson<MilestoneForm>,
) -> Result<impl IntoResponse, AppError> {
    validate_milestone_form(&payload)?;
    find_participant(&state.db, payload.participant_id).await?;

    let mut model = <milestone::ActiveModel as ActiveModelTrait>::default();
    payload.apply(&mut model);
    let created = model.insert(&state.db).await?;
    tracing::info!(milestone_id = created.id, by = auth_user.user_id, "Milestone created");

    Ok((StatusCode::CREATED, Json(MilestoneResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/edit/{id}",
    tag = "Milestones",
    operation_id = "editMilestoneForm",
    summary = "Milestone edit form",
    description = "Manager only.",
    params(("id" = i32, Path, description = "Milestone ID")),
    responses(
        (status = 200, description = "Form data", body = MilestoneFormPage),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state), fields(id))]
pub async fn edit_milestone_form(
    Manager(_): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<MilestoneFormPage>, AppError> {
    let milestone = find_milestone(&state.db, id).await?;
    Ok(Json(MilestoneFormPage {
        participants: participant_options(&state.db).await?,
        milestone: Some(milestone.into()),
    }))
}

#[utoipa::path(
    post,
    path = "/edit/{id}",
    tag = "Milestones",
    operation_id = "updateMilestone",
    summary = "Update a milestone",
    description = "Manager only.",
    params(("id" = i32, Path, description = "Milestone ID")),
    request_body = MilestoneForm,
    responses(
        (status = 200, description = "Milestone updated", body = MilestoneResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Milestone or participant not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_milestone(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<MilestoneForm>,
) -> Result<Json<MilestoneResponse>, AppError> {
    validate_milestone_form(&payload)?;

    let mut model: milestone::ActiveModel = find_milestone(&state.db, id).await?.into();
    find_participant(&state.db, payload.participant_id).await?;
    payload.apply(&mut model);
    let updated = model.update(&state.db).await?;
    tracing::info!(milestone_id = id, by = auth_user.user_id, "Milestone updated");

    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/delete/{id}",
    tag = "Milestones",
    operation_id = "deleteMilestone",
    summary = "Delete a milestone",
    description = "Manager only.",
    params(("id" = i32, Path, description = "Milestone ID")),
    responses(
        (status = 204, description = "Milestone deleted"),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_milestone(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let result = milestone::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Milestone not found".into()));
    }
    tracing::info!(milestone_id = id, by = auth_user.user_id, "Milestone deleted");

    Ok(StatusCode::NO_CONTENT)
}
