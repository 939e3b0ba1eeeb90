use serde_json::json;

use crate::common::{TEST_PASSWORD, TestApp, TestResponse, routes};

mod signup {
    use super::*;

    #[tokio::test]
    async fn new_participant_can_sign_up_and_is_logged_in() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({
                    "username": "sofia.garcia",
                    "password": TEST_PASSWORD,
                    "first_name": "Sofia",
                    "last_name": "Garcia",
                    "email": "Sofia@Example.org",
                }),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert!(res.body["token"].is_string());
        assert_eq!(res.body["user"]["username"], "sofia.garcia");
        assert_eq!(res.body["user"]["level"], "U");
        assert!(res.body["user"]["participant_id"].is_number());

        let token = res.body["token"].as_str().unwrap();
        let me = app.get_with_token(routes::ME, token).await;
        assert_eq!(me.status, 200);
        assert_eq!(me.body["first_name"], "Sofia");
    }

    #[tokio::test]
    async fn cannot_sign_up_with_a_taken_username() {
        let app = TestApp::spawn().await;
        app.sign_up("ana", "Ana", "Lopez").await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({
                    "username": "ana",
                    "password": TEST_PASSWORD,
                    "first_name": "Another",
                    "last_name": "Ana",
                    "email": "another@example.org",
                }),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "USERNAME_TAKEN");
    }

    #[tokio::test]
    async fn cannot_sign_up_with_a_short_password() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({
                    "username": "ana",
                    "password": "short",
                    "first_name": "Ana",
                    "last_name": "Lopez",
                    "email": "ana@example.org",
                }),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn sign_up_cannot_grant_the_admin_role() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({
                    "username": "sneaky",
                    "password": TEST_PASSWORD,
                    "first_name": "Sneaky",
                    "last_name": "User",
                    "email": "sneaky@example.org",
                    "role": "admin",
                }),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["user"]["level"], "U");
    }
}

mod login {
    use super::*;

    async fn login(app: &TestApp, username: &str, password: &str) -> TestResponse {
        app.post_without_token(
            routes::LOGIN,
            &json!({"username": username, "password": password}),
        )
        .await
    }

    #[tokio::test]
    async fn manager_login_carries_the_manager_level() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;

        let me = app.get_with_token(routes::ME, &token).await;

        assert_eq!(me.status, 200);
        assert_eq!(me.body["level"], "M");
        assert_eq!(me.body["username"], "boss");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let app = TestApp::spawn().await;
        app.sign_up("ana", "Ana", "Lopez").await;

        let res = login(&app, "ana", "not-the-password").await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn unknown_user_gets_the_same_error() {
        let app = TestApp::spawn().await;

        let res = login(&app, "ghost", TEST_PASSWORD).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::LOGIN, &json!({"username": "ana"}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn login_page_redirects_when_already_logged_in() {
        let app = TestApp::spawn().await;
        let user = app.sign_up("ana", "Ana", "Lopez").await;

        let anonymous = app.get_without_token(routes::LOGIN).await;
        assert_eq!(anonymous.status, 200);
        assert_eq!(anonymous.body["login_path"], "/login");

        let res = app.get_with_token(routes::LOGIN, &user.token).await;
        assert_eq!(res.status, 303);
        assert_eq!(res.location.as_deref(), Some("/"));
    }
}

mod bootstrap {
    use super::*;
    use ella_rises::config::BootstrapAdminConfig;

    #[tokio::test]
    async fn bootstrap_admin_is_created_once_and_logs_in_as_manager() {
        let app = TestApp::spawn().await;
        let admin = BootstrapAdminConfig {
            username: "founder".to_string(),
            password: TEST_PASSWORD.to_string(),
            first_name: "Ella".to_string(),
            last_name: "Founder".to_string(),
            email: "Founder@EllaRises.org".to_string(),
        };

        ella_rises::seed::seed_bootstrap_admin(&app.db, &admin)
            .await
            .unwrap();
        ella_rises::seed::seed_bootstrap_admin(&app.db, &admin)
            .await
            .unwrap();

        let token = app.login("founder", TEST_PASSWORD).await;
        let me = app.get_with_token(routes::ME, &token).await;
        assert_eq!(me.body["level"], "M");
        assert_eq!(me.body["first_name"], "Ella");

        let users = app.get_with_token(routes::USERS, &token).await;
        assert_eq!(users.body["pagination"]["total"], 1);
    }
}

mod session {
    use super::*;

    #[tokio::test]
    async fn protected_routes_redirect_to_login() {
        let app = TestApp::spawn().await;

        for path in [routes::ME, routes::PARTICIPANTS, routes::EVENTS, routes::SURVEYS] {
            let res = app.get_without_token(path).await;
            assert_eq!(res.status, 303, "{path}");
            assert_eq!(res.location.as_deref(), Some("/login"), "{path}");
        }
    }

    #[tokio::test]
    async fn invalid_token_is_treated_as_anonymous() {
        let app = TestApp::spawn().await;

        let res = app.get_with_token(routes::ME, "not-a-jwt").await;

        assert_eq!(res.status, 303);
    }

    #[tokio::test]
    async fn cookie_session_survives_until_logout() {
        let app = TestApp::spawn().await;
        app.sign_up("ana", "Ana", "Lopez").await;
        let client = app.cookie_client();

        let login = client
            .post(app.url(routes::LOGIN))
            .json(&json!({"username": "ana", "password": TEST_PASSWORD}))
            .send()
            .await
            .unwrap();
        assert_eq!(login.status().as_u16(), 200);

        let me = client.get(app.url(routes::ME)).send().await.unwrap();
        assert_eq!(me.status().as_u16(), 200);

        let logout = client.post(app.url(routes::LOGOUT)).send().await.unwrap();
        assert_eq!(logout.status().as_u16(), 303);
        assert_eq!(
            logout.headers().get("location").unwrap().to_str().unwrap(),
            "/login"
        );

        let me = client.get(app.url(routes::ME)).send().await.unwrap();
        assert_eq!(me.status().as_u16(), 303);
    }

    #[tokio::test]
    async fn logout_revokes_tokens_issued_before_it() {
        let app = TestApp::spawn().await;
        let user = app.sign_up("ana", "Ana", "Lopez").await;
        let other_device = app.login("ana", TEST_PASSWORD).await;

        let logout = app.post_with_token(routes::LOGOUT, &json!({}), &user.token).await;
        assert_eq!(logout.status, 303);

        for token in [&user.token, &other_device] {
            let me = app.get_with_token(routes::ME, token).await;
            assert_eq!(me.status, 303);
            assert_eq!(me.location.as_deref(), Some("/login"));
        }

        let fresh = app.login("ana", TEST_PASSWORD).await;
        let me = app.get_with_token(routes::ME, &fresh).await;
        assert_eq!(me.status, 200, "{}", me.text);
    }
}

mod home {
    use super::*;

    #[tokio::test]
    async fn anonymous_visitors_get_the_landing_page() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::HOME).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["view"], "landing");
        assert_eq!(res.body["donate_path"], "/donations/public");
    }

    #[tokio::test]
    async fn managers_get_organization_totals() {
        let app = TestApp::spawn().await;
        let token = app.create_manager("boss").await;
        app.sign_up("ana", "Ana", "Lopez").await;
        app.post_without_token(routes::DONATIONS_PUBLIC, &json!({"amount": 40.0}))
            .await;

        let res = app.get_with_token(routes::HOME, &token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["view"], "manager");
        assert_eq!(res.body["summary"]["participants"], 2);
        assert_eq!(res.body["summary"]["donations_total"], 40.0);
    }

    #[tokio::test]
    async fn participants_get_their_own_summary() {
        let app = TestApp::spawn().await;
        let user = app.sign_up("ana", "Ana", "Lopez").await;

        let res = app.get_with_token(routes::HOME, &user.token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["view"], "participant");
        assert_eq!(res.body["summary"]["upcoming_registrations"], 0);
        assert_eq!(res.body["summary"]["pending_surveys"], 0);
    }
}
