use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A participant's sign-up for one event occurrence.
///
/// There is no unique constraint on (participant_id, occurrence_id); the
/// register handler checks for an existing row before inserting.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "registration")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub participant_id: i32,
    #[sea_orm(belongs_to, from = "participant_id", to = "id")]
    pub participant: HasOne<super::participant::Entity>,

    pub occurrence_id: i32,
    #[sea_orm(belongs_to, relation_enum = "Occurrence", from = "occurrence_id", to = "id")]
    pub occurrence: HasOne<super::event_occurrence::Entity>,

    pub status_id: i32,
    #[sea_orm(belongs_to, relation_enum = "Status", from = "status_id", to = "id")]
    pub status: HasOne<super::registration_status::Entity>,

    #[sea_orm(has_one)]
    pub survey: HasOne<super::survey::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
