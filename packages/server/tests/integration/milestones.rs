use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;

use ella_rises::entity::milestone;

use crate::common::{TestApp, routes};

mod manager {
    use super::*;

    #[tokio::test]
    async fn milestones_list_newest_first_with_participant_names() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let ana = app.sign_up("ana", "Ana", "Lopez").await;
        let eva = app.sign_up("eva", "Eva", "Reyes").await;

        for (pid, title, date) in [
            (ana.participant_id, "Graduated high school", "2024-05-30"),
            (eva.participant_id, "First robotics award", "2025-02-11"),
            (ana.participant_id, "Started college", "2024-08-26"),
        ] {
            let res = app
                .post_with_token(
                    routes::MILESTONES_ADD,
                    &json!({"title": title, "date": date, "participant_id": pid}),
                    &token,
                )
                .await;
            assert_eq!(res.status, 201, "{}", res.text);
        }

        let res = app.get_with_token(routes::MILESTONES, &token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["view"], "manager");
        let titles: Vec<&str> = res.body["milestones"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["title"].as_str().unwrap())
            .collect();
        assert_eq!(
            titles,
            ["First robotics award", "Started college", "Graduated high school"]
        );
        assert_eq!(res.body["milestones"][0]["first_name"], "Eva");

        let search = app
            .get_with_token(&format!("{}?search=lopez", routes::MILESTONES), &token)
            .await;
        assert_eq!(search.body["pagination"]["total"], 2);

        let by_title = app
            .get_with_token(&format!("{}?search=ROBOTICS", routes::MILESTONES), &token)
            .await;
        assert_eq!(by_title.body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn milestone_can_be_edited_and_deleted() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let ana = app.sign_up("ana", "Ana", "Lopez").await;
        let created = app
            .post_with_token(
                routes::MILESTONES_ADD,
                &json!({"title": "Started college", "date": "2024-08-26", "participant_id": ana.participant_id}),
                &token,
            )
            .await;
        let id = created.id();

        let form = app
            .get_with_token(&routes::edit(routes::MILESTONES, id), &token)
            .await;
        assert_eq!(form.status, 200);
        assert_eq!(form.body["milestone"]["title"], "Started college");
        assert!(!form.body["participants"].as_array().unwrap().is_empty());

        let updated = app
            .post_with_token(
                &routes::edit(routes::MILESTONES, id),
                &json!({"title": "Started university", "date": "2024-08-27", "participant_id": ana.participant_id}),
                &token,
            )
            .await;
        assert_eq!(updated.status, 200, "{}", updated.text);
        assert_eq!(updated.body["title"], "Started university");
        assert_eq!(updated.body["date"], "2024-08-27");

        let deleted = app
            .post_with_token(&routes::delete(routes::MILESTONES, id), &json!({}), &token)
            .await;
        assert_eq!(deleted.status, 204);
        assert_eq!(milestone::Entity::find().count(&app.db).await.unwrap(), 0);

        let missing = app
            .post_with_token(&routes::delete(routes::MILESTONES, id), &json!({}), &token)
            .await;
        assert_eq!(missing.status, 404);
    }

    #[tokio::test]
    async fn milestone_needs_an_existing_participant_and_a_title() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let ana = app.sign_up("ana", "Ana", "Lopez").await;

        let orphan = app
            .post_with_token(
                routes::MILESTONES_ADD,
                &json!({"title": "Lost", "date": "2024-01-01", "participant_id": 9999}),
                &token,
            )
            .await;
        assert_eq!(orphan.status, 404);

        let blank = app
            .post_with_token(
                routes::MILESTONES_ADD,
                &json!({"title": "   ", "date": "2024-01-01", "participant_id": ana.participant_id}),
                &token,
            )
            .await;
        assert_eq!(blank.status, 400);
        assert_eq!(milestone::Entity::find().count(&app.db).await.unwrap(), 0);
    }
}

mod participant {
    use super::*;

    #[tokio::test]
    async fn participants_only_see_their_own_milestones() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        let ana = app.sign_up("ana", "Ana", "Lopez").await;
        let eva = app.sign_up("eva", "Eva", "Reyes").await;
        for (pid, title) in [
            (ana.participant_id, "Ana's milestone"),
            (eva.participant_id, "Eva's milestone"),
        ] {
            app.post_with_token(
                routes::MILESTONES_ADD,
                &json!({"title": title, "date": "2025-01-01", "participant_id": pid}),
                &token,
            )
            .await;
        }

        let res = app.get_with_token(routes::MILESTONES, &ana.token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["view"], "participant");
        let milestones = res.body["milestones"].as_array().unwrap();
        assert_eq!(milestones.len(), 1);
        assert_eq!(milestones[0]["title"], "Ana's milestone");
    }

    #[tokio::test]
    async fn participants_cannot_add_milestones() {
        let app = TestApp::spawn().await;
        let ana = app.sign_up("ana", "Ana", "Lopez").await;

        let res = app
            .post_with_token(
                routes::MILESTONES_ADD,
                &json!({"title": "Self-awarded", "date": "2025-01-01", "participant_id": ana.participant_id}),
                &ana.token,
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(milestone::Entity::find().count(&app.db).await.unwrap(), 0);
    }
}
