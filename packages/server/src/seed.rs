use chrono::Utc;
use sea_orm::sea_query::{
    Index, IndexCreateStatement, OnConflict, PostgresQueryBuilder, SqliteQueryBuilder,
};
use sea_orm::*;
use thiserror::Error;
use tracing::info;

use crate::config::BootstrapAdminConfig;
use crate::entity::{
    app_user, event_occurrence, nps_bucket, nps_rule, participant, registration,
    registration_status,
};
use crate::utils::hash;

/// Registration statuses seeded on startup. The first one is the default
/// for new registrations.
const DEFAULT_STATUSES: &[&str] = &[registration_status::DEFAULT_STATUS, "Attended", "Cancelled"];

/// NPS buckets with their inclusive recommendation score ranges.
const DEFAULT_NPS_RULES: &[(&str, i32, i32)] = &[
    (nps_bucket::DETRACTOR, 0, 6),
    (nps_bucket::PASSIVE, 7, 8),
    (nps_bucket::PROMOTER, 9, 10),
];

/// Seed registration statuses, NPS buckets and their range rules.
pub async fn seed_lookup_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let mut statuses_inserted = 0u32;
    for &status in DEFAULT_STATUSES {
        let model = registration_status::ActiveModel {
            status_text: Set(status.to_string()),
            ..Default::default()
        };

        let result = registration_status::Entity::insert(model)
            .on_conflict(
                OnConflict::column(registration_status::Column::StatusText)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(n) if n > 0 => statuses_inserted += 1,
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }
    if statuses_inserted > 0 {
        info!("Seeded {} new registration statuses", statuses_inserted);
    }

    let mut buckets_inserted = 0u32;
    for &(name, _, _) in DEFAULT_NPS_RULES {
        let model = nps_bucket::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        };

        let result = nps_bucket::Entity::insert(model)
            .on_conflict(
                OnConflict::column(nps_bucket::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(n) if n > 0 => buckets_inserted += 1,
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }
    if buckets_inserted > 0 {
        info!("Seeded {} new NPS buckets", buckets_inserted);
    }

    // Rules have no natural key; only seed an empty table so edits made by
    // operators survive restarts.
    if nps_rule::Entity::find().count(db).await? > 0 {
        return Ok(());
    }
    for &(name, min, max) in DEFAULT_NPS_RULES {
        let bucket = nps_bucket::Entity::find()
            .filter(nps_bucket::Column::Name.eq(name))
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("NPS bucket {name}")))?;

        nps_rule::ActiveModel {
            recommendation_score: Set(None),
            min_score: Set(Some(min)),
            max_score: Set(Some(max)),
            bucket_id: Set(bucket.id),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    info!("Seeded {} NPS rules", DEFAULT_NPS_RULES.len());

    Ok(())
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error("password hash error: {0}")]
    Hash(String),
}

/// Create the configured manager account unless the username already
/// exists.
pub async fn seed_bootstrap_admin(
    db: &DatabaseConnection,
    admin: &BootstrapAdminConfig,
) -> Result<(), SeedError> {
    let exists = app_user::Entity::find()
        .filter(app_user::Column::Username.eq(admin.username.as_str()))
        .count(db)
        .await?;
    if exists > 0 {
        return Ok(());
    }

    let password_hash = hash::hash_password(&admin.password)
        .map_err(|e| SeedError::Hash(e.to_string()))?;
    let now = Utc::now();

    let txn = db.begin().await?;
    let linked = participant::ActiveModel {
        first_name: Set(admin.first_name.clone()),
        last_name: Set(admin.last_name.clone()),
        email: Set(admin.email.to_lowercase()),
        role: Set(participant::ROLE_ADMIN.to_string()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    app_user::ActiveModel {
        username: Set(admin.username.clone()),
        password: Set(password_hash),
        participant_id: Set(Some(linked.id)),
        session_epoch: Set(0),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(username = %admin.username, "Created bootstrap manager account");
    Ok(())
}

fn index_sql(backend: DbBackend, stmt: &IndexCreateStatement) -> String {
    match backend {
        DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
        _ => stmt.to_string(PostgresQueryBuilder),
    }
}

/// Ensure required database indexes exist.
///
/// Schema sync only creates the unique indexes declared on entities, so
/// lookup indexes are created here on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let indexes = [
        // Duplicate-registration check and per-participant event lists.
        (
            "idx_registration_participant_occurrence",
            Index::create()
                .table(registration::Entity)
                .col(registration::Column::ParticipantId)
                .col(registration::Column::OccurrenceId)
                .to_owned(),
        ),
        // Capacity counts and event deletes.
        (
            "idx_registration_occurrence",
            Index::create()
                .table(registration::Entity)
                .col(registration::Column::OccurrenceId)
                .to_owned(),
        ),
        // Upcoming/past splits and year/month filters.
        (
            "idx_event_occurrence_start",
            Index::create()
                .table(event_occurrence::Entity)
                .col(event_occurrence::Column::StartTime)
                .to_owned(),
        ),
    ];

    for (name, mut stmt) in indexes {
        stmt.if_not_exists().name(name);
        match db.execute_unprepared(&index_sql(backend, &stmt)).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) => tracing::warn!("Failed to create index {}: {}", name, e),
        }
    }

    Ok(())
}
