use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event_template")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    pub event_type: Option<String>,
    pub description: Option<String>,

    #[sea_orm(has_many)]
    pub occurrences: HasMany<super::event_occurrence::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
