use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Maps a recommendation score to an NPS bucket.
///
/// A rule is either exact (`recommendation_score` set) or a closed range
/// (`min_score..=max_score`). Exact rules are consulted first.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nps_rule")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub recommendation_score: Option<i32>,
    pub min_score: Option<i32>,
    pub max_score: Option<i32>,

    pub bucket_id: i32,
    #[sea_orm(belongs_to, relation_enum = "Bucket", from = "bucket_id", to = "id")]
    pub bucket: HasOne<super::nps_bucket::Entity>,

    #[sea_orm(has_many)]
    pub surveys: HasMany<super::survey::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
