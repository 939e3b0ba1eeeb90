use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::*;

use crate::entity::{event_occurrence, event_template};
use crate::error::AppError;
use crate::models::event::{FilterOptions, MonthOption, TemplateOption};
use crate::utils::date_filter::{DateFilter, MONTHS};

/// Which occurrences feed the year dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearScope {
    /// Every occurrence, newest year first.
    All,
    /// Occurrences starting now or later, soonest year first.
    Upcoming,
}

/// UTC calendar year of `event_occurrence.start_time`, as an integer column.
/// SQLite keeps timestamps as UTC text that starts with the year.
fn start_year_sql(backend: DbBackend) -> &'static str {
    match backend {
        DbBackend::Sqlite => "CAST(substr(start_time, 1, 4) AS INTEGER)",
        _ => "CAST(EXTRACT(YEAR FROM start_time AT TIME ZONE 'UTC') AS INTEGER)",
    }
}

/// Distinct years holding at least one occurrence, computed by the database.
pub async fn available_years<C: ConnectionTrait>(
    db: &C,
    scope: YearScope,
) -> Result<Vec<i32>, DbErr> {
    let mut select = event_occurrence::Entity::find()
        .select_only()
        .column_as(Expr::cust(start_year_sql(db.get_database_backend())), "year")
        .distinct();
    if scope == YearScope::Upcoming {
        select = select.filter(event_occurrence::Column::StartTime.gte(Utc::now()));
    }
    let mut years: Vec<i32> = select.into_tuple().all(db).await?;

    years.sort_unstable();
    if scope == YearScope::All {
        years.reverse();
    }
    Ok(years)
}

/// Dropdown contents for the event and survey filters.
///
/// Templates cascade from the selected event type: with a type chosen only
/// that type's templates are offered.
pub async fn filter_options<C: ConnectionTrait>(
    db: &C,
    selected_type: Option<&str>,
    scope: YearScope,
) -> Result<FilterOptions, DbErr> {
    let event_types: Vec<String> = event_template::Entity::find()
        .select_only()
        .column(event_template::Column::EventType)
        .distinct()
        .filter(event_template::Column::EventType.is_not_null())
        .order_by_asc(event_template::Column::EventType)
        .into_tuple()
        .all(db)
        .await?;

    let mut templates = event_template::Entity::find()
        .select_only()
        .column(event_template::Column::Id)
        .column(event_template::Column::Name)
        .column(event_template::Column::EventType)
        .order_by_asc(event_template::Column::Name);
    if let Some(event_type) = selected_type {
        templates = templates.filter(event_template::Column::EventType.eq(event_type));
    }
    let templates = templates.into_model::<TemplateOption>().all(db).await?;

    Ok(FilterOptions {
        event_types,
        templates,
        years: available_years(db, scope).await?,
        months: MONTHS
            .iter()
            .map(|&(value, label)| MonthOption {
                value,
                label: label.to_string(),
            })
            .collect(),
    })
}

/// Conjunctive event filter shared by the event and survey listings.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub template_id: Option<i32>,
    pub dates: DateFilter,
}

impl EventFilter {
    pub fn new(
        event_type: Option<String>,
        template_id: Option<i32>,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            event_type: event_type
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            template_id,
            dates: DateFilter::new(year, month)?,
        })
    }

    /// Condition over `event_template` and `event_occurrence` columns, so the
    /// query it is applied to must join both tables.
    pub async fn condition<C: ConnectionTrait>(&self, db: &C) -> Result<Condition, DbErr> {
        let mut cond = Condition::all();
        if let Some(ref event_type) = self.event_type {
            cond = cond.add(event_template::Column::EventType.eq(event_type.as_str()));
        }
        if let Some(template_id) = self.template_id {
            cond = cond.add(event_template::Column::Id.eq(template_id));
        }

        // Month-only filters expand over the years that hold events.
        let known_years = if self.dates.year.is_none() && self.dates.month.is_some() {
            available_years(db, YearScope::All).await?
        } else {
            Vec::new()
        };
        if let Some(dates) = self
            .dates
            .condition(event_occurrence::Column::StartTime, &known_years)
        {
            cond = cond.add(dates);
        }
        Ok(cond)
    }
}
