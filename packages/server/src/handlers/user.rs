use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::sea_query::{IntoColumnRef, Query as SeaQuery};
use sea_orm::*;
use tracing::instrument;

use super::auth::{ensure_username_free, map_username_conflict};
use super::participant::{find_participant, participant_options};
use crate::entity::{app_user, participant};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::Manager;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::participant::{ParticipantOption, normalize_role};
use crate::models::user::*;
use crate::state::AppState;
use crate::utils::hash;
use crate::utils::listing::{PageRequest, fetch_page, search_condition};

/// Accounts left-joined with their participant, projected onto [`UserItem`].
fn user_items() -> Select<app_user::Entity> {
    app_user::Entity::find()
        .select_only()
        .column(app_user::Column::Id)
        .column(app_user::Column::Username)
        .column(app_user::Column::ParticipantId)
        .column(participant::Column::FirstName)
        .column(participant::Column::LastName)
        .column(participant::Column::Email)
        .column(participant::Column::Role)
        .column(app_user::Column::CreatedAt)
        .join(JoinType::LeftJoin, app_user::Relation::Participant.def())
}

async fn find_user<C: ConnectionTrait>(db: &C, id: i32) -> Result<app_user::Model, AppError> {
    app_user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Participants that no account links to yet.
async fn unlinked_participants<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<ParticipantOption>, DbErr> {
    participant::Entity::find()
        .select_only()
        .column(participant::Column::Id)
        .column(participant::Column::FirstName)
        .column(participant::Column::LastName)
        .column(participant::Column::Email)
        .filter(
            participant::Column::Id.not_in_subquery(
                SeaQuery::select()
                    .column(app_user::Column::ParticipantId)
                    .from(app_user::Entity)
                    .and_where(app_user::Column::ParticipantId.is_not_null())
                    .to_owned(),
            ),
        )
        .order_by_asc(participant::Column::LastName)
        .order_by_asc(participant::Column::FirstName)
        .into_model::<ParticipantOption>()
        .all(db)
        .await
}

/// Rejects linking a participant that another account already holds.
async fn ensure_participant_free<C: ConnectionTrait>(
    db: &C,
    participant_id: i32,
    except: Option<i32>,
) -> Result<(), AppError> {
    let mut select =
        app_user::Entity::find().filter(app_user::Column::ParticipantId.eq(participant_id));
    if let Some(id) = except {
        select = select.filter(app_user::Column::Id.ne(id));
    }
    if select.count(db).await? > 0 {
        return Err(AppError::Conflict(
            "Participant already has an account".into(),
        ));
    }
    Ok(())
}

fn hash_new_password(password: &str) -> Result<String, AppError> {
    hash::hash_password(password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Users",
    operation_id = "listUsers",
    summary = "List login accounts",
    description = "Manager only. Ordered by username, searchable by username or the linked participant's name or email (12 per page).",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users", body = UserListResponse),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn list_users(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let page = PageRequest::new(query.page, USERS_PER_PAGE);
    let mut select = user_items();
    if let Some(cond) = search_condition(
        query.search.as_deref(),
        [
            (app_user::Entity, app_user::Column::Username).into_column_ref(),
            (participant::Entity, participant::Column::FirstName).into_column_ref(),
            (participant::Entity, participant::Column::LastName).into_column_ref(),
            (participant::Entity, participant::Column::Email).into_column_ref(),
        ],
    ) {
        select = select.filter(cond);
    }
    let select = select
        .order_by_asc(app_user::Column::Username)
        .order_by_asc(app_user::Column::Id);

    let (users, pagination) = fetch_page(&state.db, select, &page).await?;

    Ok(Json(UserListResponse {
        users,
        pagination,
        search: query.search,
    }))
}

#[utoipa::path(
    get,
    path = "/add",
    tag = "Users",
    operation_id = "addUserForm",
    summary = "User add form",
    description = "Manager only. Lists participants that have no account yet.",
    responses(
        (status = 200, description = "Form data", body = AddUserPage),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state))]
pub async fn add_user_form(
    Manager(_): Manager,
    State(state): State<AppState>,
) -> Result<Json<AddUserPage>, AppError> {
    Ok(Json(AddUserPage {
        participants: unlinked_participants(&state.db).await?,
    }))
}

#[utoipa::path(
    post,
    path = "/add",
    tag = "Users",
    operation_id = "createUser",
    summary = "Create a login account",
    description = "Manager only. `participant_id` links an existing participant, `\"new\"` creates one from `participant` in the same transaction, and absent leaves the account unlinked.",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Participant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Username taken or participant already linked", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(username = %payload.username))]
pub async fn create_user(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_user(&payload)?;

    let username = payload.username.trim().to_string();
    let password_hash = hash_new_password(&payload.password)?;

    let txn = state.db.begin().await?;
    ensure_username_free(&txn, &username, None).await?;

    let participant_id = match payload.participant_id {
        ParticipantLink::None => None,
        ParticipantLink::Existing(pid) => {
            find_participant(&txn, pid).await?;
            ensure_participant_free(&txn, pid, None).await?;
            Some(pid)
        }
        ParticipantLink::New => {
            let form = payload.participant.ok_or_else(|| {
                AppError::Validation(
                    "First name, last name, and email are required for new participants".into(),
                )
            })?;
            let created = form.into_active_model()?.insert(&txn).await?;
            tracing::debug!(participant_id = created.id, "Participant created for new user");
            Some(created.id)
        }
    };

    let created = app_user::ActiveModel {
        username: Set(username),
        password: Set(password_hash),
        participant_id: Set(participant_id),
        session_epoch: Set(0),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(map_username_conflict)?;
    txn.commit().await?;

    tracing::info!(new_user_id = created.id, participant_id, by = auth_user.user_id, "User created");

    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/edit/{id}",
    tag = "Users",
    operation_id = "editUserForm",
    summary = "User edit form",
    description = "Manager only. Returns the account with its participant and every participant it could link to.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Form data", body = EditUserPage),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state), fields(id))]
pub async fn edit_user_form(
    Manager(_): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EditUserPage>, AppError> {
    let user = user_items()
        .filter(app_user::Column::Id.eq(id))
        .into_model::<UserItem>()
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(EditUserPage {
        user,
        participants: participant_options(&state.db).await?,
    }))
}

#[utoipa::path(
    post,
    path = "/edit/{id}",
    tag = "Users",
    operation_id = "updateUser",
    summary = "Update a login account",
    description = "Manager only. A blank password keeps the current one. The linked participant's role is set to `participant_role` (default `participant`).",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User or participant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Username taken or participant already linked", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_user(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate_update_user(&payload)?;

    let username = payload.username.trim().to_string();
    let role = normalize_role(payload.participant_role.as_deref())?;
    let password_hash = payload.new_password().map(hash_new_password).transpose()?;

    let txn = state.db.begin().await?;
    let mut model: app_user::ActiveModel = find_user(&txn, id).await?.into();
    ensure_username_free(&txn, &username, Some(id)).await?;

    if let Some(pid) = payload.participant_id {
        let linked = find_participant(&txn, pid).await?;
        ensure_participant_free(&txn, pid, Some(id)).await?;
        let mut linked: participant::ActiveModel = linked.into();
        linked.role = Set(role.to_string());
        linked.update(&txn).await?;
    }

    model.username = Set(username);
    model.participant_id = Set(payload.participant_id);
    if let Some(hash) = password_hash {
        model.password = Set(hash);
    }
    let updated = model.update(&txn).await.map_err(map_username_conflict)?;
    txn.commit().await?;

    tracing::info!(target_user_id = id, by = auth_user.user_id, "User updated");

    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/delete/{id}",
    tag = "Users",
    operation_id = "deleteUser",
    summary = "Delete a login account",
    description = "Manager only. The linked participant is kept. Managers cannot delete their own account.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Own account (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_user(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    if id == auth_user.user_id {
        return Err(AppError::Validation(
            "You cannot delete your own account".into(),
        ));
    }

    let result = app_user::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("User not found".into()));
    }
    tracing::info!(target_user_id = id, by = auth_user.user_id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}
