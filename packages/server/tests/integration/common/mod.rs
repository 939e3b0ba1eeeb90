use std::net::SocketAddr;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use reqwest::redirect::Policy;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::{Value, json};
use tempfile::TempDir;

use ella_rises::config::{AppConfig, AuthConfig, CorsConfig, DatabaseConfig, ServerConfig};
use ella_rises::entity::{app_user, participant, registration, registration_status};
use ella_rises::state::AppState;
use ella_rises::utils::hash;

pub mod routes {
    pub const HOME: &str = "/";
    pub const LOGIN: &str = "/login";
    pub const LOGOUT: &str = "/logout";
    pub const SIGNUP: &str = "/signup";
    pub const ME: &str = "/me";

    pub const PARTICIPANTS: &str = "/participants";
    pub const PARTICIPANTS_ADD: &str = "/participants/add";

    pub const EVENTS: &str = "/events";
    pub const EVENTS_BROWSE: &str = "/events/browse";
    pub const EVENTS_ADD: &str = "/events/add";
    pub const EVENTS_TEAPOT: &str = "/events/teapot";
    pub const TEMPLATES: &str = "/events/templates";
    pub const TEMPLATES_ADD: &str = "/events/templates/add";

    pub const SURVEYS: &str = "/surveys";

    pub const MILESTONES: &str = "/milestones";
    pub const MILESTONES_ADD: &str = "/milestones/add";

    pub const DONATIONS: &str = "/donations";
    pub const DONATIONS_ADD: &str = "/donations/add";
    pub const DONATIONS_PUBLIC: &str = "/donations/public";

    pub const USERS: &str = "/users";
    pub const USERS_ADD: &str = "/users/add";

    pub fn edit(base: &str, id: i32) -> String {
        format!("{base}/edit/{id}")
    }

    pub fn delete(base: &str, id: i32) -> String {
        format!("{base}/delete/{id}")
    }

    pub fn register(occurrence_id: i32) -> String {
        format!("/events/register/{occurrence_id}")
    }

    pub fn unregister(registration_id: i32) -> String {
        format!("/events/unregister/{registration_id}")
    }

    pub fn template_edit(id: i32) -> String {
        format!("/events/templates/edit/{id}")
    }

    pub fn template_delete(id: i32) -> String {
        format!("/events/templates/delete/{id}")
    }

    pub fn survey_submit(registration_id: i32) -> String {
        format!("/surveys/submit/{registration_id}")
    }

    pub fn survey_view(id: i32) -> String {
        format!("/surveys/view/{id}")
    }
}

pub const TEST_PASSWORD: &str = "password123";

/// A running test server backed by a fresh SQLite database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    /// Keeps the database file alive for the lifetime of the app.
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
    /// `Location` header of redirects.
    pub location: Option<String>,
}

/// A participant account created through sign-up.
pub struct TestParticipant {
    pub token: String,
    pub user_id: i32,
    pub participant_id: i32,
}

fn test_config(db_url: String) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors: CorsConfig::default(),
        },
        database: DatabaseConfig {
            url: Some(db_url),
            host: "localhost".to_string(),
            port: 5432,
            user: "unused".to_string(),
            password: String::new(),
            name: "unused".to_string(),
            ssl: false,
            min_connections: 1,
            max_connections: 5,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 30,
            sqlx_logging: false,
        },
        auth: AuthConfig {
            jwt_secret: "test-secret-for-integration-tests".to_string(),
            session_ttl_hours: 24,
            cookie_name: "ella_session".to_string(),
            cookie_secure: false,
            bootstrap_admin: None,
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let config = test_config(db_url);

        let db = ella_rises::database::init_db(&config.database)
            .await
            .expect("Failed to initialize test database");
        ella_rises::seed::seed_lookup_tables(&db)
            .await
            .expect("Failed to seed test database");
        ella_rises::seed::ensure_indexes(&db)
            .await
            .expect("Failed to create indexes");

        let state = AppState {
            db: db.clone(),
            config,
        };
        let app = ella_rises::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Self::client_builder().build().unwrap(),
            db,
            _dir: dir,
        }
    }

    fn client_builder() -> reqwest::ClientBuilder {
        Client::builder().redirect(Policy::none())
    }

    /// A client that keeps cookies between requests, for session cookie
    /// tests.
    pub fn cookie_client(&self) -> Client {
        Self::client_builder().cookie_store(true).build().unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    /// POST an HTML-form style body, as a browser form submit would.
    pub async fn post_form_with_token(&self, path: &str, body: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    /// Sign up a participant account and return its session.
    pub async fn sign_up(&self, username: &str, first_name: &str, last_name: &str) -> TestParticipant {
        let res = self
            .post_without_token(
                routes::SIGNUP,
                &json!({
                    "username": username,
                    "password": TEST_PASSWORD,
                    "first_name": first_name,
                    "last_name": last_name,
                    "email": format!("{username}@example.org"),
                }),
            )
            .await;
        assert_eq!(res.status, 201, "Sign-up failed: {}", res.text);

        TestParticipant {
            token: res.body["token"]
                .as_str()
                .expect("Sign-up response should contain a token")
                .to_string(),
            user_id: res.body["user"]["user_id"].as_i64().unwrap() as i32,
            participant_id: res.body["user"]["participant_id"].as_i64().unwrap() as i32,
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let res = self
            .post_without_token(
                routes::LOGIN,
                &json!({"username": username, "password": password}),
            )
            .await;
        assert_eq!(res.status, 200, "Login failed: {}", res.text);

        res.body["token"]
            .as_str()
            .expect("Login response should contain a token")
            .to_string()
    }

    /// Insert a manager (participant with the `admin` role plus a linked
    /// account) directly, then log in and return the auth token.
    pub async fn create_manager(&self, username: &str) -> String {
        let linked = participant::ActiveModel {
            first_name: Set("Morgan".to_string()),
            last_name: Set("Manager".to_string()),
            email: Set(format!("{username}@ellarises.org")),
            role: Set(participant::ROLE_ADMIN.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert manager participant");

        app_user::ActiveModel {
            username: Set(username.to_string()),
            password: Set(hash::hash_password(TEST_PASSWORD).unwrap()),
            participant_id: Set(Some(linked.id)),
            session_epoch: Set(0),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert manager account");

        self.login(username, TEST_PASSWORD).await
    }

    /// Create an event template via the API and return its `id`.
    pub async fn create_template(&self, token: &str, name: &str, event_type: &str) -> i32 {
        let res = self
            .post_with_token(
                routes::TEMPLATES_ADD,
                &json!({
                    "name": name,
                    "event_type": event_type,
                    "description": "Hands-on session",
                }),
                token,
            )
            .await;
        assert_eq!(res.status, 201, "create_template failed: {}", res.text);
        res.id()
    }

    /// Schedule a two-hour occurrence of `template_id` via the API and
    /// return its `id`.
    pub async fn create_event(&self, token: &str, template_id: i32, start: DateTime<Utc>) -> i32 {
        let res = self
            .post_with_token(
                routes::EVENTS_ADD,
                &json!({
                    "template_id": template_id,
                    "start_time": start,
                    "end_time": start + Duration::hours(2),
                    "location": "Community Center",
                    "capacity": 20,
                }),
                token,
            )
            .await;
        assert_eq!(res.status, 201, "create_event failed: {}", res.text);
        res.id()
    }

    /// Insert a registration directly, bypassing the started-event check of
    /// the register endpoint. Returns its `id`.
    pub async fn insert_registration(&self, participant_id: i32, occurrence_id: i32) -> i32 {
        let status = registration_status::Entity::find()
            .order_by_asc(registration_status::Column::Id)
            .one(&self.db)
            .await
            .unwrap()
            .expect("Statuses should be seeded");

        registration::ActiveModel {
            participant_id: Set(participant_id),
            occurrence_id: Set(occurrence_id),
            status_id: Set(status.id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert registration")
        .id
    }

    pub async fn registration_count(&self, participant_id: i32, occurrence_id: i32) -> u64 {
        registration::Entity::find()
            .filter(registration::Column::ParticipantId.eq(participant_id))
            .filter(registration::Column::OccurrenceId.eq(occurrence_id))
            .count(&self.db)
            .await
            .unwrap()
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let location = res
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            text,
            body,
            location,
        }
    }

    pub fn id(&self) -> i32 {
        self.body["id"]
            .as_i64()
            .expect("response body should contain 'id'") as i32
    }
}
