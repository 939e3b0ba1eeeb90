use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Relational database settings.
///
/// Either a full `url` is given, or the URL is assembled from the individual
/// connection parts (the usual deployment case, e.g. `ELLA__DATABASE__HOST`).
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL. Takes precedence over the individual parts.
    #[serde(default)]
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub name: String,
    /// Require TLS for the Postgres connection.
    #[serde(default)]
    pub ssl: bool,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

impl DatabaseConfig {
    /// Connection URL handed to the pool. Credentials are percent-encoded,
    /// so passwords may contain `@`, `:`, `/` or `#`.
    pub fn connection_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.to_string());
        }

        let mut url = Url::parse(&format!("postgres://{}:{}/{}", self.host, self.port, self.name))
            .map_err(|e| ConfigError::Message(format!("Invalid database host or name: {}", e)))?;
        let no_credentials =
            |()| ConfigError::Message("Database URL cannot carry credentials".into());
        url.set_username(&self.user).map_err(no_credentials)?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password)).map_err(no_credentials)?;
        }
        if self.ssl {
            url.query_pairs_mut().append_pair("sslmode", "require");
        }
        Ok(url.into())
    }
}

/// Manager account created on first start when no account with that
/// username exists yet.
#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapAdminConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_admin_first_name")]
    pub first_name: String,
    #[serde(default = "default_admin_last_name")]
    pub last_name: String,
    #[serde(default = "default_admin_email")]
    pub email: String,
}

fn default_admin_first_name() -> String {
    "Site".into()
}
fn default_admin_last_name() -> String {
    "Manager".into()
}
fn default_admin_email() -> String {
    "manager@ellarises.org".into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub cookie_name: String,
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("ELLA_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.user", "postgres")?
            .set_default("database.name", "ellarises")?
            .set_default("database.min_connections", 2)?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 30)?
            .set_default("auth.session_ttl_hours", 24)?
            .set_default("auth.cookie_name", "ella_session")?
            // Load from config/config.toml
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., ELLA__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("ELLA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
