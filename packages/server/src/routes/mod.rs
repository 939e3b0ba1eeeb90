use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn app_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(auth_routes())
        .nest("/participants", participant_routes())
        .nest("/events", event_routes())
        .nest("/surveys", survey_routes())
        .nest("/milestones", milestone_routes())
        .nest("/donations", donation_routes())
        .nest("/users", user_routes())
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::home))
        .routes(routes!(handlers::auth::login_page, handlers::auth::login))
        .routes(routes!(handlers::auth::logout))
        .routes(routes!(handlers::auth::signup))
        .routes(routes!(handlers::auth::me))
}

fn participant_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::participant::list_participants))
        .routes(routes!(
            handlers::participant::add_participant_form,
            handlers::participant::create_participant
        ))
        .routes(routes!(
            handlers::participant::edit_participant_form,
            handlers::participant::update_participant
        ))
        .routes(routes!(handlers::participant::delete_participant))
}

fn event_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::event::list_events))
        .routes(routes!(handlers::event::browse_events))
        .routes(routes!(handlers::event::register_for_event))
        .routes(routes!(handlers::event::unregister_from_event))
        .routes(routes!(
            handlers::event::add_event_form,
            handlers::event::create_event
        ))
        .routes(routes!(
            handlers::event::edit_event_form,
            handlers::event::update_event
        ))
        .routes(routes!(handlers::event::delete_event))
        .routes(routes!(handlers::event::list_templates))
        .routes(routes!(handlers::event::create_template))
        .routes(routes!(handlers::event::update_template))
        .routes(routes!(handlers::event::delete_template))
        .routes(routes!(handlers::event::teapot))
}

fn survey_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::survey::list_surveys))
        .routes(routes!(handlers::survey::submit_survey))
        .routes(routes!(handlers::survey::view_survey))
        .routes(routes!(handlers::survey::delete_survey))
}

fn milestone_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::milestone::list_milestones))
        .routes(routes!(
            handlers::milestone::add_milestone_form,
            handlers::milestone::create_milestone
        ))
        .routes(routes!(
            handlers::milestone::edit_milestone_form,
            handlers::milestone::update_milestone
        ))
        .routes(routes!(handlers::milestone::delete_milestone))
}

fn donation_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::donation::list_donations))
        .routes(routes!(handlers::donation::public_donation))
        .routes(routes!(
            handlers::donation::add_donation_form,
            handlers::donation::create_donation
        ))
        .routes(routes!(
            handlers::donation::edit_donation_form,
            handlers::donation::update_donation
        ))
        .routes(routes!(handlers::donation::delete_donation))
}

fn user_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::user::list_users))
        .routes(routes!(
            handlers::user::add_user_form,
            handlers::user::create_user
        ))
        .routes(routes!(
            handlers::user::edit_user_form,
            handlers::user::update_user
        ))
        .routes(routes!(handlers::user::delete_user))
}
