//! Survey score rollups. The query layer only fetches rows; everything here
//! is plain arithmetic so the same numbers come out on every backend.

use sea_orm::FromQueryResult;
use serde::Serialize;
use utoipa::ToSchema;

use crate::entity::nps_bucket;

/// One survey's scores plus the name of the NPS bucket it resolved to.
#[derive(Debug, Clone, FromQueryResult)]
pub struct ScoreRow {
    pub satisfaction: i32,
    pub usefulness: i32,
    pub instructor: i32,
    pub recommendation: i32,
    pub overall: i32,
    pub bucket: Option<String>,
}

/// Promoter / passive / detractor counts and the net promoter score.
#[derive(Debug, Default, Serialize, PartialEq, ToSchema)]
pub struct NpsBreakdown {
    pub promoters: u64,
    pub passives: u64,
    pub detractors: u64,
    /// Responses whose recommendation matched no rule.
    pub unclassified: u64,
    /// `%promoters - %detractors` over classified responses, one decimal.
    /// Absent when nothing is classified.
    #[schema(example = 42.9)]
    pub score: Option<f64>,
}

#[derive(Debug, Serialize, PartialEq, ToSchema)]
pub struct SurveyStats {
    /// Responses matching the active filters.
    #[schema(example = 14)]
    pub response_count: u64,
    /// All responses, ignoring filters.
    #[schema(example = 120)]
    pub total_count: u64,
    pub avg_satisfaction: Option<f64>,
    pub avg_usefulness: Option<f64>,
    pub avg_instructor: Option<f64>,
    pub avg_recommendation: Option<f64>,
    pub avg_overall: Option<f64>,
    pub nps: NpsBreakdown,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn average<F>(rows: &[ScoreRow], pick: F) -> Option<f64>
where
    F: Fn(&ScoreRow) -> i32,
{
    if rows.is_empty() {
        return None;
    }
    let sum: i64 = rows.iter().map(|r| i64::from(pick(r))).sum();
    Some(round_to(sum as f64 / rows.len() as f64, 2))
}

fn breakdown(rows: &[ScoreRow]) -> NpsBreakdown {
    let mut nps = NpsBreakdown::default();
    for row in rows {
        match row.bucket.as_deref() {
            Some(nps_bucket::PROMOTER) => nps.promoters += 1,
            Some(nps_bucket::PASSIVE) => nps.passives += 1,
            Some(nps_bucket::DETRACTOR) => nps.detractors += 1,
            _ => nps.unclassified += 1,
        }
    }

    let classified = nps.promoters + nps.passives + nps.detractors;
    if classified > 0 {
        let net = (nps.promoters as f64 - nps.detractors as f64) * 100.0 / classified as f64;
        nps.score = Some(round_to(net, 1));
    }
    nps
}

/// Roll up the filtered `rows`. `total_count` is the unfiltered table size
/// and is passed through untouched.
pub fn summarize(rows: &[ScoreRow], total_count: u64) -> SurveyStats {
    SurveyStats {
        response_count: rows.len() as u64,
        total_count,
        avg_satisfaction: average(rows, |r| r.satisfaction),
        avg_usefulness: average(rows, |r| r.usefulness),
        avg_instructor: average(rows, |r| r.instructor),
        avg_recommendation: average(rows, |r| r.recommendation),
        avg_overall: average(rows, |r| r.overall),
        nps: breakdown(rows),
    }
}
