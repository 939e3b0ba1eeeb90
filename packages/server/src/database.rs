use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use crate::config::DatabaseConfig;

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let url = config
        .connection_url()
        .map_err(|e| DbErr::Custom(e.to_string()))?;
    let mut opt = ConnectOptions::new(url);

    // Set connection pool options
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(config.sqlx_logging);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("ella_rises::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}
