use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const PROMOTER: &str = "Promoter";
pub const PASSIVE: &str = "Passive";
pub const DETRACTOR: &str = "Detractor";

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nps_bucket")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    #[sea_orm(has_many)]
    pub rules: HasMany<super::nps_rule::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
