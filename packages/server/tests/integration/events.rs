use chrono::{Datelike, Duration, TimeZone, Utc};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;

use ella_rises::entity::{event_occurrence, registration};

use crate::common::{TestApp, routes};

mod manager_list {
    use super::*;

    #[tokio::test]
    async fn future_is_the_default_and_past_is_newest_first() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let soon = app
            .create_event(&token, template, Utc::now() + Duration::days(2))
            .await;
        let later = app
            .create_event(&token, template, Utc::now() + Duration::days(20))
            .await;
        let last_week = app
            .create_event(&token, template, Utc::now() - Duration::days(7))
            .await;
        let last_month = app
            .create_event(&token, template, Utc::now() - Duration::days(30))
            .await;

        let future = app.get_with_token(routes::EVENTS, &token).await;
        assert_eq!(future.status, 200, "{}", future.text);
        assert_eq!(future.body["view"], "manager");
        assert_eq!(future.body["filter"], "future");
        let ids: Vec<i64> = future.body["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, [soon as i64, later as i64]);

        let past = app
            .get_with_token(&format!("{}?filter=past", routes::EVENTS), &token)
            .await;
        assert_eq!(past.body["filter"], "past");
        let ids: Vec<i64> = past.body["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, [last_week as i64, last_month as i64]);
    }

    #[tokio::test]
    async fn type_filter_narrows_events_and_template_options() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let robotics = app.create_template(&token, "Robotics", "STEAM").await;
        let folklorico = app.create_template(&token, "Folklorico", "Heritage").await;
        let start = Utc::now() + Duration::days(3);
        app.create_event(&token, robotics, start).await;
        app.create_event(&token, folklorico, start).await;

        let res = app
            .get_with_token(&format!("{}?type=STEAM&name=", routes::EVENTS), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let events = res.body["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["name"], "Robotics");
        assert_eq!(res.body["selected"]["event_type"], "STEAM");
        assert_eq!(res.body["options"]["event_types"], json!(["Heritage", "STEAM"]));
        let templates = res.body["options"]["templates"].as_array().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0]["id"], robotics);
        assert_eq!(res.body["options"]["months"].as_array().unwrap().len(), 12);
        assert!(
            res.body["options"]["years"]
                .as_array()
                .unwrap()
                .contains(&json!(start.year()))
        );
    }

    #[tokio::test]
    async fn month_only_filter_spans_the_years_that_hold_events() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let start = Utc::now() + Duration::days(3);
        let event = app.create_event(&token, template, start).await;
        let other_month = if start.month() == 12 { 1 } else { start.month() + 1 };

        let hit = app
            .get_with_token(&format!("{}?month={}", routes::EVENTS, start.month()), &token)
            .await;
        let miss = app
            .get_with_token(&format!("{}?month={}", routes::EVENTS, other_month), &token)
            .await;

        assert_eq!(hit.status, 200, "{}", hit.text);
        assert_eq!(hit.body["events"][0]["id"], event);
        assert_eq!(hit.body["options"]["years"], json!([start.year()]));
        assert!(miss.body["events"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_month_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;

        let res = app
            .get_with_token(&format!("{}?month=13", routes::EVENTS), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod registration_flow {
    use super::*;

    #[tokio::test]
    async fn registering_redirects_and_shows_up_in_my_events() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let user = app.sign_up("ana", "Ana", "Lopez").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let event = app
            .create_event(&token, template, Utc::now() + Duration::days(5))
            .await;

        let res = app
            .post_with_token(&routes::register(event), &json!({}), &user.token)
            .await;

        assert_eq!(res.status, 303);
        assert_eq!(res.location.as_deref(), Some("/events?registered=success"));
        assert_eq!(app.registration_count(user.participant_id, event).await, 1);

        let mine = app
            .get_with_token(&format!("{}?registered=success", routes::EVENTS), &user.token)
            .await;
        assert_eq!(mine.status, 200);
        assert_eq!(mine.body["view"], "participant");
        assert_eq!(mine.body["registered"], "success");
        let events = mine.body["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["occurrence_id"], event);
        assert_eq!(events[0]["name"], "Robotics");
        assert_eq!(events[0]["status"], "Registered");
    }

    #[tokio::test]
    async fn registering_twice_does_not_duplicate() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let user = app.sign_up("ana", "Ana", "Lopez").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let event = app
            .create_event(&token, template, Utc::now() + Duration::days(5))
            .await;

        app.post_with_token(&routes::register(event), &json!({}), &user.token)
            .await;
        let again = app
            .post_with_token(&routes::register(event), &json!({}), &user.token)
            .await;

        assert_eq!(again.status, 303);
        assert_eq!(
            again.location.as_deref(),
            Some("/events/browse?error=already_registered")
        );
        assert_eq!(app.registration_count(user.participant_id, event).await, 1);
    }

    #[tokio::test]
    async fn browse_hides_events_already_registered_for() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let user = app.sign_up("ana", "Ana", "Lopez").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let first = app
            .create_event(&token, template, Utc::now() + Duration::days(5))
            .await;
        let second = app
            .create_event(&token, template, Utc::now() + Duration::days(6))
            .await;
        app.create_event(&token, template, Utc::now() - Duration::days(6))
            .await;

        let before = app.get_with_token(routes::EVENTS_BROWSE, &user.token).await;
        assert_eq!(before.status, 200, "{}", before.text);
        assert_eq!(before.body["pagination"]["total"], 2);

        app.post_with_token(&routes::register(first), &json!({}), &user.token)
            .await;

        let after = app.get_with_token(routes::EVENTS_BROWSE, &user.token).await;
        let events = after.body["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["id"], second);
    }

    #[tokio::test]
    async fn started_and_full_events_are_refused() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let ana = app.sign_up("ana", "Ana", "Lopez").await;
        let eva = app.sign_up("eva", "Eva", "Reyes").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let started = app
            .create_event(&token, template, Utc::now() - Duration::hours(1))
            .await;
        let start = Utc::now() + Duration::days(5);
        let single_seat = app
            .post_with_token(
                routes::EVENTS_ADD,
                &json!({
                    "template_id": template,
                    "start_time": start,
                    "end_time": start + Duration::hours(1),
                    "location": "Library",
                    "capacity": 1,
                }),
                &token,
            )
            .await
            .id();

        let res = app
            .post_with_token(&routes::register(started), &json!({}), &ana.token)
            .await;
        assert_eq!(res.location.as_deref(), Some("/events/browse?error=event_started"));
        assert_eq!(app.registration_count(ana.participant_id, started).await, 0);

        let res = app
            .post_with_token(&routes::register(single_seat), &json!({}), &ana.token)
            .await;
        assert_eq!(res.location.as_deref(), Some("/events?registered=success"));

        let res = app
            .post_with_token(&routes::register(single_seat), &json!({}), &eva.token)
            .await;
        assert_eq!(res.location.as_deref(), Some("/events/browse?error=event_full"));
        assert_eq!(app.registration_count(eva.participant_id, single_seat).await, 0);
    }

    #[tokio::test]
    async fn registering_for_a_missing_event_is_not_found() {
        let app = TestApp::spawn().await;
        let user = app.sign_up("ana", "Ana", "Lopez").await;

        let res = app
            .post_with_token(&routes::register(4242), &json!({}), &user.token)
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn only_the_owner_can_unregister() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let ana = app.sign_up("ana", "Ana", "Lopez").await;
        let eva = app.sign_up("eva", "Eva", "Reyes").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let event = app
            .create_event(&token, template, Utc::now() + Duration::days(5))
            .await;
        let reg = app.insert_registration(ana.participant_id, event).await;

        let res = app
            .post_with_token(&routes::unregister(reg), &json!({}), &eva.token)
            .await;
        assert_eq!(res.status, 303);
        assert_eq!(res.location.as_deref(), Some("/events"));
        assert_eq!(app.registration_count(ana.participant_id, event).await, 1);

        let res = app
            .post_with_token(&routes::unregister(reg), &json!({}), &ana.token)
            .await;
        assert_eq!(res.status, 303);
        assert_eq!(app.registration_count(ana.participant_id, event).await, 0);
    }
}

mod management {
    use super::*;

    #[tokio::test]
    async fn end_before_start_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let start = Utc::now() + Duration::days(1);

        let res = app
            .post_with_token(
                routes::EVENTS_ADD,
                &json!({
                    "template_id": template,
                    "start_time": start,
                    "end_time": start - Duration::hours(1),
                    "location": "Library",
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn datetime_local_form_values_are_read_as_utc() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;

        let res = app
            .post_with_token(
                routes::EVENTS_ADD,
                &json!({
                    "template_id": template,
                    "start_time": "2030-06-01T17:00",
                    "end_time": "2030-06-01T19:30",
                    "location": "Library",
                    "registration_deadline": "",
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        let stored = event_occurrence::Entity::find_by_id(res.id())
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.start_time,
            Utc.with_ymd_and_hms(2030, 6, 1, 17, 0, 0).unwrap()
        );
        assert_eq!(
            stored.end_time,
            Utc.with_ymd_and_hms(2030, 6, 1, 19, 30, 0).unwrap()
        );
        assert!(stored.registration_deadline.is_none());
    }

    #[tokio::test]
    async fn unknown_template_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let start = Utc::now() + Duration::days(1);

        let res = app
            .post_with_token(
                routes::EVENTS_ADD,
                &json!({
                    "template_id": 777,
                    "start_time": start,
                    "end_time": start + Duration::hours(1),
                    "location": "Library",
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn manager_can_edit_an_event() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let start = Utc::now() + Duration::days(4);
        let event = app.create_event(&token, template, start).await;

        let res = app
            .post_with_token(
                &routes::edit(routes::EVENTS, event),
                &json!({
                    "template_id": template,
                    "start_time": start,
                    "end_time": start + Duration::hours(3),
                    "location": "Orem Rec Center",
                    "capacity": 35,
                }),
                &token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["location"], "Orem Rec Center");
        assert_eq!(res.body["capacity"], 35);

        let form = app
            .get_with_token(&routes::edit(routes::EVENTS, event), &token)
            .await;
        assert_eq!(form.status, 200);
        assert_eq!(form.body["event"]["location"], "Orem Rec Center");
        assert_eq!(form.body["templates"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_an_event_removes_its_registrations() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let user = app.sign_up("ana", "Ana", "Lopez").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let event = app
            .create_event(&token, template, Utc::now() + Duration::days(4))
            .await;
        app.insert_registration(user.participant_id, event).await;

        let res = app
            .post_with_token(&routes::delete(routes::EVENTS, event), &json!({}), &token)
            .await;

        assert_eq!(res.status, 204);
        assert_eq!(registration::Entity::find().count(&app.db).await.unwrap(), 0);
        assert!(
            event_occurrence::Entity::find_by_id(event)
                .one(&app.db)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn non_managers_cannot_manage_events() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let user = app.sign_up("ana", "Ana", "Lopez").await;
        let template = app.create_template(&token, "Robotics", "STEAM").await;
        let event = app
            .create_event(&token, template, Utc::now() + Duration::days(4))
            .await;

        let delete = app
            .post_with_token(&routes::delete(routes::EVENTS, event), &json!({}), &user.token)
            .await;
        let add_form = app.get_with_token(routes::EVENTS_ADD, &user.token).await;
        let templates = app.get_with_token(routes::TEMPLATES, &user.token).await;

        for res in [&delete, &add_form, &templates] {
            assert_eq!(res.status, 403);
            assert_eq!(res.body["code"], "PERMISSION_DENIED");
        }
        assert!(
            event_occurrence::Entity::find_by_id(event)
                .one(&app.db)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn teapot_is_a_teapot() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::EVENTS_TEAPOT).await;

        assert_eq!(res.status, 418);
    }
}

mod templates {
    use super::*;

    #[tokio::test]
    async fn templates_can_be_edited_and_listed_by_name() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let robotics = app.create_template(&token, "Robotics", "STEAM").await;
        app.create_template(&token, "Art Night", "Heritage").await;

        let res = app
            .post_with_token(
                &routes::template_edit(robotics),
                &json!({"name": "Robotics II", "event_type": "STEAM", "description": "  "}),
                &token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["name"], "Robotics II");
        assert!(res.body["description"].is_null());

        let list = app.get_with_token(routes::TEMPLATES, &token).await;
        let names: Vec<&str> = list
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Art Night", "Robotics II"]);
    }

    #[tokio::test]
    async fn a_template_in_use_cannot_be_deleted() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let used = app.create_template(&token, "Robotics", "STEAM").await;
        let unused = app.create_template(&token, "Art Night", "Heritage").await;
        app.create_event(&token, used, Utc::now() + Duration::days(1))
            .await;

        let res = app
            .post_with_token(&routes::template_delete(used), &json!({}), &token)
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");

        let res = app
            .post_with_token(&routes::template_delete(unused), &json!({}), &token)
            .await;
        assert_eq!(res.status, 204);
    }
}
