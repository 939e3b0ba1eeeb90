use sea_orm::{ConnectionTrait, DbErr, EntityTrait, QueryOrder};

use crate::entity::nps_rule;

/// Round-half-up mean of the four survey sub-scores.
///
/// Scores are non-negative, so integer `(sum + 2) / 4` rounds exactly like
/// `round(sum / 4)` with halves going up: (5, 4, 4, 5) gives 18 / 4 = 4.5
/// and rounds to 5.
pub fn overall_score(satisfaction: i32, usefulness: i32, instructor: i32, recommendation: i32) -> i32 {
    let sum = satisfaction + usefulness + instructor + recommendation;
    (sum + 2).div_euclid(4)
}

/// In-memory snapshot of the NPS rule table, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct NpsRules {
    rules: Vec<nps_rule::Model>,
}

impl NpsRules {
    pub fn new(mut rules: Vec<nps_rule::Model>) -> Self {
        rules.sort_by_key(|r| r.id);
        Self { rules }
    }

    pub async fn load<C: ConnectionTrait>(db: &C) -> Result<Self, DbErr> {
        let rules = nps_rule::Entity::find()
            .order_by_asc(nps_rule::Column::Id)
            .all(db)
            .await?;
        Ok(Self::new(rules))
    }

    /// Rule for a recommendation score.
    ///
    /// An exact `recommendation_score` match beats any range match. Within a
    /// tier the lowest id wins. Range rules need both bounds set.
    pub fn resolve(&self, score: i32) -> Option<&nps_rule::Model> {
        self.rules
            .iter()
            .find(|r| r.recommendation_score == Some(score))
            .or_else(|| {
                self.rules.iter().find(|r| match (r.min_score, r.max_score) {
                    (Some(min), Some(max)) => (min..=max).contains(&score),
                    _ => false,
                })
            })
    }
}

/// Load the rules and resolve `score` in one go. `None` when nothing
/// matches; an unmatched score is not an error.
pub async fn resolve_rule_id<C: ConnectionTrait>(db: &C, score: i32) -> Result<Option<i32>, DbErr> {
    let rules = NpsRules::load(db).await?;
    Ok(rules.resolve(score).map(|r| r.id))
}
