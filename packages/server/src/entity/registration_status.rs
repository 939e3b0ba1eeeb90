use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status text assigned to new registrations. Seeded first, so it has the
/// lowest id.
pub const DEFAULT_STATUS: &str = "Registered";

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "registration_status")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub status_text: String,

    #[sea_orm(has_many)]
    pub registrations: HasMany<super::registration::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
