use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event_occurrence")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub template_id: i32,
    #[sea_orm(belongs_to, relation_enum = "Template", from = "template_id", to = "id")]
    pub template: HasOne<super::event_template::Entity>,

    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,
    pub location: String,
    pub capacity: Option<i32>,
    pub registration_deadline: Option<DateTimeUtc>,

    #[sea_orm(has_many)]
    pub registrations: HasMany<super::registration::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
