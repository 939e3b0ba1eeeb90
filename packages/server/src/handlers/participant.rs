use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::IntoColumnRef;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{app_user, donation, milestone, participant, registration};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, Manager};
use crate::extractors::json::{AppJson, AppQuery};
use crate::handlers::event::delete_surveys_of;
use crate::models::participant::*;
use crate::state::AppState;
use crate::utils::listing::{PageRequest, fetch_page, search_condition};

pub(crate) async fn find_participant<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<participant::Model, AppError> {
    participant::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Participant not found".into()))
}

/// Dropdown options, ordered by last name.
pub(crate) async fn participant_options<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<ParticipantOption>, DbErr> {
    participant::Entity::find()
        .select_only()
        .column(participant::Column::Id)
        .column(participant::Column::FirstName)
        .column(participant::Column::LastName)
        .column(participant::Column::Email)
        .order_by_asc(participant::Column::LastName)
        .order_by_asc(participant::Column::FirstName)
        .into_model::<ParticipantOption>()
        .all(db)
        .await
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Participants",
    operation_id = "listParticipants",
    summary = "List participants or show own profile",
    description = "Managers get a searchable, paginated list (12 per page). Other users get their own profile.",
    params(ParticipantListQuery),
    responses(
        (status = 200, description = "Participants page", body = ParticipantsPage),
        (status = 303, description = "Not logged in, redirect to /login"),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn list_participants(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ParticipantListQuery>,
) -> Result<Json<ParticipantsPage>, AppError> {
    if !auth_user.is_manager() {
        let participant = match auth_user.participant_id {
            Some(pid) => participant::Entity::find_by_id(pid)
                .one(&state.db)
                .await?
                .map(ParticipantResponse::from),
            None => None,
        };
        return Ok(Json(ParticipantsPage::Profile { participant }));
    }

    let page = PageRequest::new(query.page, PARTICIPANTS_PER_PAGE);
    let mut select = participant::Entity::find();
    if let Some(cond) = search_condition(
        query.search.as_deref(),
        [
            participant::Column::FirstName,
            participant::Column::LastName,
            participant::Column::Email,
            participant::Column::City,
        ]
        .map(|c| (participant::Entity, c).into_column_ref()),
    ) {
        select = select.filter(cond);
    }
    let select = select
        .order_by_asc(participant::Column::LastName)
        .order_by_asc(participant::Column::FirstName)
        .order_by_asc(participant::Column::Id);

    let (participants, pagination) = fetch_page(&state.db, select, &page).await?;

    Ok(Json(ParticipantsPage::Manager {
        participants,
        pagination,
        search: query.search,
    }))
}

#[utoipa::path(
    get,
    path = "/add",
    tag = "Participants",
    operation_id = "addParticipantForm",
    summary = "Participant add form",
    description = "Manager only. Lists the roles a participant can hold.",
    responses(
        (status = 200, description = "Form data", body = ParticipantFormPage),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
pub async fn add_participant_form(Manager(_): Manager) -> Result<Json<ParticipantFormPage>, AppError> {
    Ok(Json(ParticipantFormPage {
        roles: vec![participant::ROLE_PARTICIPANT, participant::ROLE_ADMIN],
    }))
}

#[utoipa::path(
    post,
    path = "/add",
    tag = "Participants",
    operation_id = "createParticipant",
    summary = "Create a participant",
    description = "Manager only.",
    request_body = ParticipantForm,
    responses(
        (status = 201, description = "Participant created", body = ParticipantResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn create_participant(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ParticipantForm>,
) -> Result<impl IntoResponse, AppError> {
    validate_participant_form(&payload)?;

    let model = payload.into_active_model()?.insert(&state.db).await?;
    tracing::info!(participant_id = model.id, by = auth_user.user_id, "Participant created");

    Ok((StatusCode::CREATED, Json(ParticipantResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/edit/{id}",
    tag = "Participants",
    operation_id = "getParticipantForEdit",
    summary = "Participant edit form",
    description = "Manager only. Returns the current values.",
    params(("id" = i32, Path, description = "Participant ID")),
    responses(
        (status = 200, description = "Participant", body = ParticipantResponse),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state), fields(id))]
pub async fn edit_participant_form(
    Manager(_): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ParticipantResponse>, AppError> {
    Ok(Json(find_participant(&state.db, id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/edit/{id}",
    tag = "Participants",
    operation_id = "updateParticipant",
    summary = "Update a participant",
    description = "Manager only. Replaces every profile field.",
    params(("id" = i32, Path, description = "Participant ID")),
    request_body = ParticipantForm,
    responses(
        (status = 200, description = "Participant updated", body = ParticipantResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_participant(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ParticipantForm>,
) -> Result<Json<ParticipantResponse>, AppError> {
    validate_participant_form(&payload)?;

    let mut model: participant::ActiveModel = find_participant(&state.db, id).await?.into();
    payload.apply(&mut model)?;
    let updated = model.update(&state.db).await?;
    tracing::info!(participant_id = id, by = auth_user.user_id, "Participant updated");

    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/delete/{id}",
    tag = "Participants",
    operation_id = "deleteParticipant",
    summary = "Delete a participant",
    description = "Manager only. Removes the participant's milestones, registrations and their surveys, and unlinks donations and accounts, all in one transaction.",
    params(("id" = i32, Path, description = "Participant ID")),
    responses(
        (status = 204, description = "Participant deleted"),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_participant(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let txn = state.db.begin().await?;
    find_participant(&txn, id).await?;

    let of_participant = Condition::all().add(registration::Column::ParticipantId.eq(id));
    delete_surveys_of(&txn, of_participant.clone()).await?;
    registration::Entity::delete_many()
        .filter(of_participant)
        .exec(&txn)
        .await?;
    milestone::Entity::delete_many()
        .filter(milestone::Column::ParticipantId.eq(id))
        .exec(&txn)
        .await?;
    donation::Entity::update_many()
        .col_expr(donation::Column::ParticipantId, Expr::value(Option::<i32>::None))
        .filter(donation::Column::ParticipantId.eq(id))
        .exec(&txn)
        .await?;
    app_user::Entity::update_many()
        .col_expr(app_user::Column::ParticipantId, Expr::value(Option::<i32>::None))
        .filter(app_user::Column::ParticipantId.eq(id))
        .exec(&txn)
        .await?;
    participant::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;
    tracing::info!(participant_id = id, by = auth_user.user_id, "Participant deleted");

    Ok(StatusCode::NO_CONTENT)
}
