use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "survey")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub registration_id: i32,
    #[sea_orm(belongs_to, from = "registration_id", to = "id")]
    pub registration: HasOne<super::registration::Entity>,

    pub satisfaction: i32,
    pub usefulness: i32,
    pub instructor: i32,
    pub recommendation: i32,
    /// Round-half-up mean of the four sub-scores.
    pub overall: i32,

    /// NULL when no NPS rule matched the recommendation score.
    pub nps_rule_id: Option<i32>,
    #[sea_orm(belongs_to, from = "nps_rule_id", to = "id")]
    pub nps_rule: BelongsTo<Option<super::nps_rule::Entity>>,

    pub comments: Option<String>,
    pub submitted_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
