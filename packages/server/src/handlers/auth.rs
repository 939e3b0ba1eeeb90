use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::Query as SeaQuery;
use sea_orm::*;
use tracing::instrument;

use crate::config::AuthConfig;
use crate::entity::{app_user, donation, event_occurrence, milestone, participant, registration, survey};
use crate::error::{AppError, ErrorBody, LOGIN_PATH};
use crate::extractors::auth::{AuthUser, RoleLevel, Session};
use crate::extractors::json::AppJson;
use crate::models::auth::*;
use crate::state::AppState;
use crate::utils::{hash, jwt};

/// Session contents for an account and its linked participant.
pub fn session_user(account: &app_user::Model, linked: Option<&participant::Model>) -> AuthUser {
    AuthUser {
        user_id: account.id,
        username: account.username.clone(),
        level: RoleLevel::from_participant_role(linked.map(|p| p.role.as_str())),
        participant_id: account.participant_id,
        first_name: linked.map(|p| p.first_name.clone()),
        last_name: linked.map(|p| p.last_name.clone()),
        session_epoch: account.session_epoch,
    }
}

fn session_cookie(auth: &AuthConfig, token: String) -> Cookie<'static> {
    Cookie::build((auth.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(auth.cookie_secure)
        .build()
}

/// Sign a token for `user` and attach it to the jar.
fn issue_session(
    auth: &AuthConfig,
    jar: CookieJar,
    user: AuthUser,
) -> Result<(CookieJar, SessionResponse), AppError> {
    let token = jwt::sign(&user, &auth.jwt_secret, auth.session_ttl_hours)
        .map_err(|e| AppError::Internal(format!("JWT sign error: {}", e)))?;
    let jar = jar.add(session_cookie(auth, token.clone()));
    Ok((
        jar,
        SessionResponse {
            token,
            user: user.into(),
        },
    ))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Auth",
    operation_id = "home",
    summary = "Landing page or dashboard",
    description = "Anonymous visitors get the public landing. Logged-in users get a dashboard summary shaped by their role.",
    responses(
        (status = 200, description = "Landing or dashboard", body = HomePage),
    ),
)]
#[instrument(skip(state, session))]
pub async fn home(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<HomePage>, AppError> {
    let Some(user) = session.user().cloned() else {
        return Ok(Json(HomePage::Landing {
            organization: "Ella Rises",
            login_path: LOGIN_PATH,
            donate_path: "/donations/public",
        }));
    };

    let now = Utc::now();
    if user.is_manager() {
        let participants = participant::Entity::find().count(&state.db).await?;
        let upcoming_events = event_occurrence::Entity::find()
            .filter(event_occurrence::Column::StartTime.gte(now))
            .count(&state.db)
            .await?;
        let survey_responses = survey::Entity::find().count(&state.db).await?;
        let donations_total: Option<Option<f64>> = donation::Entity::find()
            .select_only()
            .column_as(donation::Column::Amount.sum(), "total")
            .into_tuple()
            .one(&state.db)
            .await?;

        return Ok(Json(HomePage::Manager {
            user: user.into(),
            summary: ManagerSummary {
                participants,
                upcoming_events,
                survey_responses,
                donations_total: donations_total.flatten().unwrap_or(0.0),
            },
        }));
    }

    let summary = match user.participant_id {
        Some(pid) => {
            let upcoming_registrations = registration::Entity::find()
                .join(JoinType::InnerJoin, registration::Relation::Occurrence.def())
                .filter(registration::Column::ParticipantId.eq(pid))
                .filter(event_occurrence::Column::StartTime.gte(now))
                .count(&state.db)
                .await?;
            let pending_surveys = registration::Entity::find()
                .join(JoinType::InnerJoin, registration::Relation::Occurrence.def())
                .filter(registration::Column::ParticipantId.eq(pid))
                .filter(event_occurrence::Column::StartTime.lt(now))
                .filter(
                    registration::Column::Id.not_in_subquery(
                        SeaQuery::select()
                            .column(survey::Column::RegistrationId)
                            .from(survey::Entity)
                            .to_owned(),
                    ),
                )
                .count(&state.db)
                .await?;
            let milestones = milestone::Entity::find()
                .filter(milestone::Column::ParticipantId.eq(pid))
                .count(&state.db)
                .await?;
            Some(ParticipantSummary {
                upcoming_registrations,
                pending_surveys,
                milestones,
            })
        }
        None => None,
    };

    Ok(Json(HomePage::Participant {
        user: user.into(),
        summary,
    }))
}

#[utoipa::path(
    get,
    path = "/login",
    tag = "Auth",
    operation_id = "loginPage",
    summary = "Login page",
    description = "Redirects to `/` when a session is already active.",
    responses(
        (status = 200, description = "Login page data", body = LoginPage),
        (status = 303, description = "Already logged in"),
    ),
)]
pub async fn login_page(session: Session) -> Response {
    match session {
        Session::Authenticated(_) => Redirect::to("/").into_response(),
        Session::Anonymous => Json(LoginPage {
            login_path: LOGIN_PATH,
            signup_path: "/signup",
        })
        .into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    operation_id = "login",
    summary = "Log in",
    description = "Verifies the credentials, sets the session cookie and returns the session token.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = SessionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Bad credentials (INVALID_CREDENTIALS)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, jar, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_login_request(&payload)?;

    let username = payload.username.trim();

    let (account, linked) = app_user::Entity::find()
        .filter(app_user::Column::Username.eq(username))
        .find_also_related(participant::Entity)
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let is_valid = hash::verify_password(&payload.password, &account.password)
        .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;

    if !is_valid {
        return Err(AppError::InvalidCredentials);
    }

    let user = session_user(&account, linked.as_ref());
    tracing::info!(user_id = user.user_id, level = ?user.level, "Login succeeded");

    let (jar, body) = issue_session(&state.config.auth, jar, user)?;
    Ok((jar, Json(body)))
}

#[utoipa::path(
    post,
    path = "/logout",
    tag = "Auth",
    operation_id = "logout",
    summary = "Log out",
    description = "Revokes every token issued to the account so far, clears the session cookie and redirects to the login page.",
    responses(
        (status = 303, description = "Redirect to /login"),
    ),
)]
#[instrument(skip(state, jar, session))]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(user) = session.user() {
        app_user::Entity::update_many()
            .col_expr(
                app_user::Column::SessionEpoch,
                Expr::col(app_user::Column::SessionEpoch).add(1),
            )
            .filter(app_user::Column::Id.eq(user.user_id))
            .exec(&state.db)
            .await?;
        tracing::info!(user_id = user.user_id, "Session revoked");
    }

    let jar = jar.remove(Cookie::build((state.config.auth.cookie_name.clone(), "")).path("/"));
    Ok((jar, Redirect::to(LOGIN_PATH)))
}

#[utoipa::path(
    post,
    path = "/signup",
    tag = "Auth",
    operation_id = "signup",
    summary = "Create a participant account",
    description = "Creates a participant and a linked login in one transaction, then logs the new user in.",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SessionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Username taken (USERNAME_TAKEN)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, jar, payload), fields(username = %payload.username))]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_signup_request(&payload)?;

    let username = payload.username.trim().to_string();
    let password_hash = hash::hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let mut form = payload.participant;
    form.role = Some(participant::ROLE_PARTICIPANT.to_string());

    let txn = state.db.begin().await?;
    ensure_username_free(&txn, &username, None).await?;

    let linked = form.into_active_model()?.insert(&txn).await?;
    let account = app_user::ActiveModel {
        username: Set(username),
        password: Set(password_hash),
        participant_id: Set(Some(linked.id)),
        session_epoch: Set(0),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(map_username_conflict)?;
    txn.commit().await?;

    let user = session_user(&account, Some(&linked));
    tracing::info!(user_id = user.user_id, participant_id = linked.id, "Participant signed up");

    let (jar, body) = issue_session(&state.config.auth, jar, user)?;
    Ok((StatusCode::CREATED, jar, Json(body)))
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Auth",
    operation_id = "me",
    summary = "Current session",
    responses(
        (status = 200, description = "Session user", body = SessionUser),
        (status = 303, description = "Not logged in, redirect to /login"),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(auth_user), fields(user_id = auth_user.user_id))]
pub async fn me(auth_user: AuthUser) -> Json<SessionUser> {
    Json(auth_user.into())
}

/// `UsernameTaken` if another account (other than `except`) holds the name.
pub async fn ensure_username_free<C: ConnectionTrait>(
    db: &C,
    username: &str,
    except: Option<i32>,
) -> Result<(), AppError> {
    let mut select = app_user::Entity::find().filter(app_user::Column::Username.eq(username));
    if let Some(id) = except {
        select = select.filter(app_user::Column::Id.ne(id));
    }
    if select.count(db).await? > 0 {
        return Err(AppError::UsernameTaken);
    }
    Ok(())
}

/// The unique index still catches a concurrent insert that slipped past
/// [`ensure_username_free`].
pub fn map_username_conflict(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            tracing::debug!("Username race: unique constraint caught on write");
            AppError::UsernameTaken
        }
        _ => AppError::from(e),
    }
}
