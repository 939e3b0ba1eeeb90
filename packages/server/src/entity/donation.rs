use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "donation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub amount: f64,
    pub date: Option<Date>,

    /// NULL for anonymous donations.
    pub participant_id: Option<i32>,
    #[sea_orm(belongs_to, from = "participant_id", to = "id")]
    pub participant: BelongsTo<Option<super::participant::Entity>>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
