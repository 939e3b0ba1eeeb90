use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Participant role that grants manager access at login.
pub const ROLE_ADMIN: &str = "admin";
/// Role given to self-registered and manager-created participants by default.
pub const ROLE_PARTICIPANT: &str = "participant";

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participant")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub dob: Option<Date>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub school_or_employer: Option<String>,
    pub field_of_interest: Option<String>,
    /// One of `admin` or `participant`.
    pub role: String,

    #[sea_orm(has_many)]
    pub registrations: HasMany<super::registration::Entity>,
    #[sea_orm(has_many)]
    pub milestones: HasMany<super::milestone::Entity>,
    #[sea_orm(has_many)]
    pub donations: HasMany<super::donation::Entity>,
    #[sea_orm(has_many)]
    pub accounts: HasMany<super::app_user::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
