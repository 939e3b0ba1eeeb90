use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use chrono::Utc;
use sea_orm::sea_query::Query as SeaQuery;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{event_occurrence, event_template, registration, registration_status, survey};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, Manager};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::event::*;
use crate::state::AppState;
use crate::utils::event_filter::{EventFilter, YearScope, filter_options};
use crate::utils::listing::{PageRequest, fetch_page};

pub const REGISTERED_REDIRECT: &str = "/events?registered=success";
pub const ALREADY_REGISTERED_REDIRECT: &str = "/events/browse?error=already_registered";

fn browse_error(code: &str) -> Redirect {
    Redirect::to(&format!("/events/browse?error={code}"))
}

/// Occurrences joined with their template, projected onto [`OccurrenceItem`].
fn occurrence_select() -> Select<event_occurrence::Entity> {
    event_occurrence::Entity::find()
        .select_only()
        .column_as(event_occurrence::Column::Id, "id")
        .column(event_occurrence::Column::TemplateId)
        .column_as(event_template::Column::Name, "name")
        .column(event_template::Column::EventType)
        .column(event_template::Column::Description)
        .column(event_occurrence::Column::StartTime)
        .column(event_occurrence::Column::EndTime)
        .column(event_occurrence::Column::Location)
        .column(event_occurrence::Column::Capacity)
        .column(event_occurrence::Column::RegistrationDeadline)
        .join(JoinType::InnerJoin, event_occurrence::Relation::Template.def())
}

fn selected(filter: &EventFilter) -> SelectedFilters {
    SelectedFilters {
        event_type: filter.event_type.clone(),
        template_id: filter.template_id,
        year: filter.dates.year,
        month: filter.dates.month,
    }
}

async fn find_occurrence<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<event_occurrence::Model, AppError> {
    event_occurrence::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

async fn find_template<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<event_template::Model, AppError> {
    event_template::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event template not found".into()))
}

async fn all_templates<C: ConnectionTrait>(db: &C) -> Result<Vec<TemplateResponse>, DbErr> {
    event_template::Entity::find()
        .order_by_asc(event_template::Column::Name)
        .into_model::<TemplateResponse>()
        .all(db)
        .await
}

/// Delete the surveys of every registration matched by `registrations`.
pub(crate) async fn delete_surveys_of<C: ConnectionTrait>(
    db: &C,
    registrations: Condition,
) -> Result<(), DbErr> {
    survey::Entity::delete_many()
        .filter(
            survey::Column::RegistrationId.in_subquery(
                SeaQuery::select()
                    .column(registration::Column::Id)
                    .from(registration::Entity)
                    .cond_where(registrations)
                    .to_owned(),
            ),
        )
        .exec(db)
        .await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Events",
    operation_id = "listEvents",
    summary = "List events",
    description = "Managers see every occurrence, filtered by time (`future` by default, or `past`), event type, template, year and month, 10 per page, with cascading dropdown options. Other users see their own registrations.",
    params(EventListQuery),
    responses(
        (status = 200, description = "Events page", body = EventsPage),
        (status = 400, description = "Invalid filter (VALIDATION_ERROR)", body = ErrorBody),
        (status = 303, description = "Not logged in, redirect to /login"),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn list_events(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<EventListQuery>,
) -> Result<Json<EventsPage>, AppError> {
    let time = TimeFilter::parse(query.filter.as_deref());
    let page = PageRequest::new(query.page, EVENTS_PER_PAGE);
    let now = Utc::now();

    if !auth_user.is_manager() {
        let mut select = registration::Entity::find()
            .select_only()
            .column_as(registration::Column::Id, "registration_id")
            .column_as(registration::Column::CreatedAt, "registered_at")
            .column_as(event_occurrence::Column::Id, "occurrence_id")
            .column_as(event_template::Column::Name, "name")
            .column(event_template::Column::EventType)
            .column(event_template::Column::Description)
            .column(event_occurrence::Column::StartTime)
            .column(event_occurrence::Column::EndTime)
            .column(event_occurrence::Column::Location)
            .column(event_occurrence::Column::Capacity)
            .column_as(registration_status::Column::StatusText, "status")
            .join(JoinType::InnerJoin, registration::Relation::Occurrence.def())
            .join(JoinType::InnerJoin, event_occurrence::Relation::Template.def())
            .join(JoinType::InnerJoin, registration::Relation::Status.def())
            // An unlinked account has no registrations.
            .filter(registration::Column::ParticipantId.eq(auth_user.participant_id.unwrap_or(-1)));

        select = match time {
            TimeFilter::Past => select
                .filter(event_occurrence::Column::StartTime.lt(now))
                .order_by_desc(event_occurrence::Column::StartTime),
            TimeFilter::Future => select
                .filter(event_occurrence::Column::StartTime.gte(now))
                .order_by_asc(event_occurrence::Column::StartTime),
        };

        let (events, pagination) = fetch_page(&state.db, select, &page).await?;
        return Ok(Json(EventsPage::Participant {
            events,
            pagination,
            filter: time,
            registered: query.registered,
        }));
    }

    let filter = EventFilter::new(query.event_type, query.template_id, query.year, query.month)?;
    let mut select = occurrence_select().filter(filter.condition(&state.db).await?);
    select = match time {
        TimeFilter::Past => select
            .filter(event_occurrence::Column::StartTime.lt(now))
            .order_by_desc(event_occurrence::Column::StartTime),
        TimeFilter::Future => select
            .filter(event_occurrence::Column::StartTime.gte(now))
            .order_by_asc(event_occurrence::Column::StartTime),
    };
    let select = select.order_by_asc(event_occurrence::Column::Id);

    let (events, pagination) = fetch_page(&state.db, select, &page).await?;
    let options = filter_options(&state.db, filter.event_type.as_deref(), YearScope::All).await?;

    Ok(Json(EventsPage::Manager {
        events,
        pagination,
        filter: time,
        selected: selected(&filter),
        options,
    }))
}

#[utoipa::path(
    get,
    path = "/browse",
    tag = "Events",
    operation_id = "browseEvents",
    summary = "Browse upcoming events",
    description = "Upcoming occurrences the caller has not registered for, with the same filters as the manager list. Year options only cover upcoming events.",
    params(EventListQuery),
    responses(
        (status = 200, description = "Browse page", body = BrowsePage),
        (status = 400, description = "Invalid filter (VALIDATION_ERROR)", body = ErrorBody),
        (status = 303, description = "Not logged in, redirect to /login"),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn browse_events(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<EventListQuery>,
) -> Result<Json<BrowsePage>, AppError> {
    let page = PageRequest::new(query.page, EVENTS_PER_PAGE);
    let filter = EventFilter::new(query.event_type, query.template_id, query.year, query.month)?;

    let mut select = occurrence_select()
        .filter(event_occurrence::Column::StartTime.gte(Utc::now()))
        .filter(filter.condition(&state.db).await?);
    if let Some(pid) = auth_user.participant_id {
        select = select.filter(
            event_occurrence::Column::Id.not_in_subquery(
                SeaQuery::select()
                    .column(registration::Column::OccurrenceId)
                    .from(registration::Entity)
                    .and_where(registration::Column::ParticipantId.eq(pid))
                    .to_owned(),
            ),
        );
    }
    let select = select
        .order_by_asc(event_occurrence::Column::StartTime)
        .order_by_asc(event_occurrence::Column::Id);

    let (events, pagination) = fetch_page(&state.db, select, &page).await?;
    let options =
        filter_options(&state.db, filter.event_type.as_deref(), YearScope::Upcoming).await?;

    Ok(Json(BrowsePage {
        events,
        pagination,
        selected: selected(&filter),
        options,
        error: query.error,
    }))
}

#[utoipa::path(
    post,
    path = "/register/{occurrence_id}",
    tag = "Events",
    operation_id = "registerForEvent",
    summary = "Register for an event",
    description = "Registers the caller's participant for the occurrence and redirects to `/events?registered=success`. A second registration for the same occurrence redirects to `/events/browse?error=already_registered` without inserting. Started events, closed registration and full events redirect to browse with `event_started`, `registration_closed` or `event_full`.",
    params(("occurrence_id" = i32, Path, description = "Event occurrence ID")),
    responses(
        (status = 303, description = "Redirect with the outcome"),
        (status = 400, description = "Account not linked to a participant (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, occurrence_id))]
pub async fn register_for_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(occurrence_id): Path<i32>,
) -> Result<Redirect, AppError> {
    let participant_id = auth_user.require_participant()?;

    let txn = state.db.begin().await?;
    let occurrence = find_occurrence(&txn, occurrence_id).await?;

    let existing = registration::Entity::find()
        .filter(registration::Column::ParticipantId.eq(participant_id))
        .filter(registration::Column::OccurrenceId.eq(occurrence_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Ok(Redirect::to(ALREADY_REGISTERED_REDIRECT));
    }

    let now = Utc::now();
    if occurrence.start_time <= now {
        return Ok(browse_error("event_started"));
    }
    if occurrence.registration_deadline.is_some_and(|d| d < now) {
        return Ok(browse_error("registration_closed"));
    }
    if let Some(capacity) = occurrence.capacity {
        let taken = registration::Entity::find()
            .filter(registration::Column::OccurrenceId.eq(occurrence_id))
            .count(&txn)
            .await?;
        if taken >= u64::try_from(capacity).unwrap_or(0) {
            return Ok(browse_error("event_full"));
        }
    }

    let status = match registration_status::Entity::find()
        .filter(registration_status::Column::StatusText.eq(registration_status::DEFAULT_STATUS))
        .one(&txn)
        .await?
    {
        Some(status) => status,
        None => registration_status::Entity::find()
            .order_by_asc(registration_status::Column::Id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::Internal("No registration statuses are seeded".into()))?,
    };

    registration::ActiveModel {
        participant_id: Set(participant_id),
        occurrence_id: Set(occurrence_id),
        status_id: Set(status.id),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(participant_id, occurrence_id, "Registered for event");
    Ok(Redirect::to(REGISTERED_REDIRECT))
}

#[utoipa::path(
    post,
    path = "/unregister/{registration_id}",
    tag = "Events",
    operation_id = "unregisterFromEvent",
    summary = "Cancel a registration",
    description = "Deletes the registration only when it belongs to the caller's participant, together with its survey if one was filed, then redirects to `/events`.",
    params(("registration_id" = i32, Path, description = "Registration ID")),
    responses(
        (status = 303, description = "Redirect to /events"),
        (status = 400, description = "Account not linked to a participant (VALIDATION_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, registration_id))]
pub async fn unregister_from_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(registration_id): Path<i32>,
) -> Result<Redirect, AppError> {
    let participant_id = auth_user.require_participant()?;
    let owned = Condition::all()
        .add(registration::Column::Id.eq(registration_id))
        .add(registration::Column::ParticipantId.eq(participant_id));

    let txn = state.db.begin().await?;
    delete_surveys_of(&txn, owned.clone()).await?;
    let result = registration::Entity::delete_many()
        .filter(owned)
        .exec(&txn)
        .await?;
    txn.commit().await?;

    if result.rows_affected > 0 {
        tracing::info!(participant_id, registration_id, "Unregistered from event");
    }
    Ok(Redirect::to("/events"))
}

#[utoipa::path(
    get,
    path = "/add",
    tag = "Events",
    operation_id = "addEventForm",
    summary = "Event add form",
    description = "Manager only. Lists the templates an occurrence can be scheduled from.",
    responses(
        (status = 200, description = "Form data", body = OccurrenceFormPage),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state))]
pub async fn add_event_form(
    Manager(_): Manager,
    State(state): State<AppState>,
) -> Result<Json<OccurrenceFormPage>, AppError> {
    Ok(Json(OccurrenceFormPage {
        templates: all_templates(&state.db).await?,
        event: None,
    }))
}

#[utoipa::path(
    post,
    path = "/add",
    tag = "Events",
    operation_id = "createEvent",
    summary = "Schedule an event",
    description = "Manager only. End must follow start, capacity cannot be negative, and the registration deadline cannot follow the start.",
    request_body = OccurrenceForm,
    responses(
        (status = 201, description = "Event created", body = OccurrenceResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Template not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(template_id = payload.template_id))]
pub async fn create_event(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    AppJson(payload): AppJson<OccurrenceForm>,
) -> Result<impl IntoResponse, AppError> {
    validate_occurrence_form(&payload)?;
    find_template(&state.db, payload.template_id).await?;

    let mut model = <event_occurrence::ActiveModel as ActiveModelTrait>::default();
    payload.apply(&mut model);
    let created = model.insert(&state.db).await?;
    tracing::info!(occurrence_id = created.id, by = auth_user.user_id, "Event created");

    Ok((StatusCode::CREATED, Json(OccurrenceResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/edit/{id}",
    tag = "Events",
    operation_id = "editEventForm",
    summary = "Event edit form",
    description = "Manager only.",
    params(("id" = i32, Path, description = "Event occurrence ID")),
    responses(
        (status = 200, description = "Form data", body = OccurrenceFormPage),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state), fields(id))]
pub async fn edit_event_form(
    Manager(_): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OccurrenceFormPage>, AppError> {
    let event = find_occurrence(&state.db, id).await?;
    Ok(Json(OccurrenceFormPage {
        templates: all_templates(&state.db).await?,
        event: Some(event.into()),
    }))
}

#[utoipa::path(
    post,
    path = "/edit/{id}",
    tag = "Events",
    operation_id = "updateEvent",
    summary = "Update an event",
    description = "Manager only. Same validation as creation.",
    params(("id" = i32, Path, description = "Event occurrence ID")),
    request_body = OccurrenceForm,
    responses(
        (status = 200, description = "Event updated", body = OccurrenceResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event or template not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_event(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<OccurrenceForm>,
) -> Result<Json<OccurrenceResponse>, AppError> {
    validate_occurrence_form(&payload)?;

    let mut model: event_occurrence::ActiveModel = find_occurrence(&state.db, id).await?.into();
    find_template(&state.db, payload.template_id).await?;
    payload.apply(&mut model);
    let updated = model.update(&state.db).await?;
    tracing::info!(occurrence_id = id, by = auth_user.user_id, "Event updated");

    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/delete/{id}",
    tag = "Events",
    operation_id = "deleteEvent",
    summary = "Delete an event",
    description = "Manager only. Removes the occurrence with its registrations and their surveys in one transaction.",
    params(("id" = i32, Path, description = "Event occurrence ID")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_event(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let txn = state.db.begin().await?;
    find_occurrence(&txn, id).await?;
    let of_event = Condition::all().add(registration::Column::OccurrenceId.eq(id));
    delete_surveys_of(&txn, of_event.clone()).await?;
    registration::Entity::delete_many()
        .filter(of_event)
        .exec(&txn)
        .await?;
    event_occurrence::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(occurrence_id = id, by = auth_user.user_id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/templates",
    tag = "Event Templates",
    operation_id = "listTemplates",
    summary = "List event templates",
    description = "Manager only. Ordered by name.",
    responses(
        (status = 200, description = "Templates", body = Vec<TemplateResponse>),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state))]
pub async fn list_templates(
    Manager(_): Manager,
    State(state): State<AppState>,
) -> Result<Json<Vec<TemplateResponse>>, AppError> {
    Ok(Json(all_templates(&state.db).await?))
}

#[utoipa::path(
    post,
    path = "/templates/add",
    tag = "Event Templates",
    operation_id = "createTemplate",
    summary = "Create an event template",
    description = "Manager only.",
    request_body = TemplateForm,
    responses(
        (status = 201, description = "Template created", body = TemplateResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(name = %payload.name))]
pub async fn create_template(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    AppJson(payload): AppJson<TemplateForm>,
) -> Result<impl IntoResponse, AppError> {
    validate_template_form(&payload)?;

    let mut model = <event_template::ActiveModel as ActiveModelTrait>::default();
    payload.apply(&mut model);
    let created = model.insert(&state.db).await?;
    tracing::info!(template_id = created.id, by = auth_user.user_id, "Event template created");

    Ok((StatusCode::CREATED, Json(TemplateResponse::from(created))))
}

#[utoipa::path(
    post,
    path = "/templates/edit/{id}",
    tag = "Event Templates",
    operation_id = "updateTemplate",
    summary = "Update an event template",
    description = "Manager only.",
    params(("id" = i32, Path, description = "Template ID")),
    request_body = TemplateForm,
    responses(
        (status = 200, description = "Template updated", body = TemplateResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_template(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<TemplateForm>,
) -> Result<Json<TemplateResponse>, AppError> {
    validate_template_form(&payload)?;

    let mut model: event_template::ActiveModel = find_template(&state.db, id).await?.into();
    payload.apply(&mut model);
    let updated = model.update(&state.db).await?;
    tracing::info!(template_id = id, by = auth_user.user_id, "Event template updated");

    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/templates/delete/{id}",
    tag = "Event Templates",
    operation_id = "deleteTemplate",
    summary = "Delete an event template",
    description = "Manager only. Rejected with 409 while any occurrence still uses the template.",
    params(("id" = i32, Path, description = "Template ID")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Template in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_template(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let txn = state.db.begin().await?;
    find_template(&txn, id).await?;
    let in_use = event_occurrence::Entity::find()
        .filter(event_occurrence::Column::TemplateId.eq(id))
        .count(&txn)
        .await?;
    if in_use > 0 {
        return Err(AppError::Conflict(format!(
            "Template is used by {in_use} scheduled event(s)"
        )));
    }
    event_template::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(template_id = id, by = auth_user.user_id, "Event template deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/teapot",
    tag = "Events",
    operation_id = "teapot",
    summary = "I'm a teapot",
    responses(
        (status = 418, description = "Always"),
    ),
)]
pub async fn teapot() -> impl IntoResponse {
    (StatusCode::IM_A_TEAPOT, "I'm a teapot")
}
