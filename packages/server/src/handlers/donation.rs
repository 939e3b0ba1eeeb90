use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::sea_query::{IntoColumnRef, NullOrdering, Order};
use sea_orm::*;
use tracing::instrument;

use super::participant::{find_participant, participant_options};
use crate::entity::{donation, participant};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, Manager, Session};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::donation::*;
use crate::state::AppState;
use crate::utils::listing::{PageRequest, fetch_page, search_condition};

async fn find_donation<C: ConnectionTrait>(db: &C, id: i32) -> Result<donation::Model, AppError> {
    donation::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Donation not found".into()))
}

async fn check_donor<C: ConnectionTrait>(db: &C, participant_id: Option<i32>) -> Result<(), AppError> {
    if let Some(pid) = participant_id {
        find_participant(db, pid).await?;
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Donations",
    operation_id = "listDonations",
    summary = "List donations",
    description = "Managers get every donation (undated last, then newest first), searchable by donor name or email (12 per page), with the total over all donations. Other users get their own donations and the supporters list: one row per donor with their latest donation, searchable by name, 20 per page.",
    params(DonationListQuery),
    responses(
        (status = 200, description = "Donations page", body = DonationsPage),
        (status = 303, description = "Not logged in, redirect to /login"),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn list_donations(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DonationListQuery>,
) -> Result<Json<DonationsPage>, AppError> {
    let donor_columns = [
        (participant::Entity, participant::Column::FirstName).into_column_ref(),
        (participant::Entity, participant::Column::LastName).into_column_ref(),
    ];

    if !auth_user.is_manager() {
        let my_donations = match auth_user.participant_id {
            Some(pid) => donation::Entity::find()
                .filter(donation::Column::ParticipantId.eq(pid))
                .order_by_with_nulls(donation::Column::Date, Order::Desc, NullOrdering::Last)
                .order_by_desc(donation::Column::Id)
                .all(&state.db)
                .await?
                .into_iter()
                .map(DonationResponse::from)
                .collect(),
            None => Vec::new(),
        };

        let mut supporters = donation::Entity::find()
            .select_only()
            .column(donation::Column::ParticipantId)
            .column(participant::Column::FirstName)
            .column(participant::Column::LastName)
            .column_as(donation::Column::Date.max(), "latest_donation")
            .join(JoinType::LeftJoin, donation::Relation::Participant.def())
            .group_by(donation::Column::ParticipantId)
            .group_by(participant::Column::FirstName)
            .group_by(participant::Column::LastName);
        if let Some(cond) = search_condition(query.search.as_deref(), donor_columns) {
            supporters = supporters.filter(cond);
        }
        let mut supporters = supporters
            .into_model::<SupporterItem>()
            .all(&state.db)
            .await?;
        // Most recent donors first; donors without a dated gift go last.
        supporters.sort_by(|a, b| {
            b.latest_donation
                .cmp(&a.latest_donation)
                .then_with(|| a.last_name.cmp(&b.last_name))
                .then_with(|| a.first_name.cmp(&b.first_name))
        });

        let page = PageRequest::new(query.page, SUPPORTERS_PER_PAGE);
        let (supporters, pagination) = page.slice(supporters);

        return Ok(Json(DonationsPage::Participant {
            my_donations,
            supporters,
            pagination,
            search: query.search,
        }));
    }

    let page = PageRequest::new(query.page, DONATIONS_PER_PAGE);
    let mut select = donation::Entity::find()
        .select_only()
        .column(donation::Column::Id)
        .column(donation::Column::Amount)
        .column(donation::Column::Date)
        .column(donation::Column::ParticipantId)
        .column(participant::Column::FirstName)
        .column(participant::Column::LastName)
        .column(participant::Column::Email)
        .join(JoinType::LeftJoin, donation::Relation::Participant.def());
    let [first, last] = donor_columns;
    if let Some(cond) = search_condition(
        query.search.as_deref(),
        [
            first,
            last,
            (participant::Entity, participant::Column::Email).into_column_ref(),
        ],
    ) {
        select = select.filter(cond);
    }
    let select = select
        .order_by_with_nulls(donation::Column::Date, Order::Desc, NullOrdering::Last)
        .order_by_desc(donation::Column::Id);

    let (donations, pagination) = fetch_page(&state.db, select, &page).await?;

    let total: Option<Option<f64>> = donation::Entity::find()
        .select_only()
        .column_as(donation::Column::Amount.sum(), "total")
        .into_tuple()
        .one(&state.db)
        .await?;

    Ok(Json(DonationsPage::Manager {
        donations,
        pagination,
        total_amount: round_cents(total.flatten().unwrap_or(0.0)),
        search: query.search,
    }))
}

#[utoipa::path(
    post,
    path = "/public",
    tag = "Donations",
    operation_id = "publicDonation",
    summary = "Donate",
    description = "Open to everyone. Logged-in donors are linked through their participant; everyone else donates anonymously. Dated today.",
    request_body = PublicDonationRequest,
    responses(
        (status = 201, description = "Donation recorded", body = DonationResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, session, payload))]
pub async fn public_donation(
    session: Session,
    State(state): State<AppState>,
    AppJson(payload): AppJson<PublicDonationRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_amount(payload.amount)?;

    let participant_id = session.user().and_then(|u| u.participant_id);
    let created = DonationForm {
        amount: payload.amount,
        date: Some(Utc::now().date_naive()),
        participant_id,
    }
    .into_active_model()
    .insert(&state.db)
    .await?;
    tracing::info!(
        donation_id = created.id,
        amount = created.amount,
        anonymous = participant_id.is_none(),
        "Public donation received"
    );

    Ok((StatusCode::CREATED, Json(DonationResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/add",
    tag = "Donations",
    operation_id = "addDonationForm",
    summary = "Donation add form",
    description = "Manager only. Lists the participants a donation can be attributed to.",
    responses(
        (status = 200, description = "Form data", body = DonationFormPage),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state))]
pub async fn add_donation_form(
    Manager(_): Manager,
    State(state): State<AppState>,
) -> Result<Json<DonationFormPage>, AppError> {
    Ok(Json(DonationFormPage {
        participants: participant_options(&state.db).await?,
        donation: None,
    }))
}

#[utoipa::path(
    post,
    path = "/add",
    tag = "Donations",
    operation_id = "createDonation",
    summary = "Record a donation",
    description = "Manager only. The date defaults to today.",
    request_body = DonationForm,
    responses(
        (status = 201, description = "Donation created", body = DonationResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Participant not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn create_donation(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    AppJson(payload): AppJson<DonationForm>,
) -> Result<impl IntoResponse, AppError> {
    validate_donation_form(&payload)?;
    check_donor(&state.db, payload.participant_id).await?;

    let created = payload.into_active_model().insert(&state.db).await?;
    tracing::info!(donation_id = created.id, by = auth_user.user_id, "Donation created");

    Ok((StatusCode::CREATED, Json(DonationResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/edit/{id}",
    tag = "Donations",
    operation_id = "editDonationForm",
    summary = "Donation edit form",
    description = "Manager only.",
    params(("id" = i32, Path, description = "Donation ID")),
    responses(
        (status = 200, description = "Form data", body = DonationFormPage),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state), fields(id))]
pub async fn edit_donation_form(
    Manager(_): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DonationFormPage>, AppError> {
    let donation = find_donation(&state.db, id).await?;
    Ok(Json(DonationFormPage {
        participants: participant_options(&state.db).await?,
        donation: Some(donation.into()),
    }))
}

#[utoipa::path(
    post,
    path = "/edit/{id}",
    tag = "Donations",
    operation_id = "updateDonation",
    summary = "Update a donation",
    description = "Manager only. Replaces amount, date and donor.",
    params(("id" = i32, Path, description = "Donation ID")),
    request_body = DonationForm,
    responses(
        (status = 200, description = "Donation updated", body = DonationResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Donation or participant not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_donation(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<DonationForm>,
) -> Result<Json<DonationResponse>, AppError> {
    validate_donation_form(&payload)?;

    let mut model: donation::ActiveModel = find_donation(&state.db, id).await?.into();
    check_donor(&state.db, payload.participant_id).await?;
    payload.apply(&mut model);
    let updated = model.update(&state.db).await?;
    tracing::info!(donation_id = id, by = auth_user.user_id, "Donation updated");

    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/delete/{id}",
    tag = "Donations",
    operation_id = "deleteDonation",
    summary = "Delete a donation",
    description = "Manager only.",
    params(("id" = i32, Path, description = "Donation ID")),
    responses(
        (status = 204, description = "Donation deleted"),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_donation(
    Manager(auth_user): Manager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let result = donation::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Donation not found".into()));
    }
    tracing::info!(donation_id = id, by = auth_user.user_id, "Donation deleted");

    Ok(StatusCode::NO_CONTENT)
}
