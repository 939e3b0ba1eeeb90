//! Shared list controller used by every resource listing: page clamping,
//! case-insensitive search over a set of columns, and count + page fetch.

use sea_orm::prelude::Expr;
use sea_orm::sea_query::ExprTrait;
use sea_orm::sea_query::{ColumnRef, Func, LikeExpr};
use sea_orm::{
    Condition, ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, QuerySelect, Select,
};

use crate::error::AppError;
use crate::models::shared::{Pagination, escape_like};

/// Upper bound for a client-supplied `per_page`.
pub const MAX_PER_PAGE: u64 = 100;

/// Upper bound for a client-supplied `page`. Keeps the row offset well
/// inside the signed 64-bit range databases accept.
pub const MAX_PAGE: u64 = 1_000_000;

/// A resolved page request. Page numbers start at 1; anything lower is
/// treated as the first page and anything past [`MAX_PAGE`] as the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, per_page: u64) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
            total,
            total_pages: total.div_ceil(self.per_page),
        }
    }

    /// Slice an already-materialized result set, for grouped queries that
    /// are paginated after aggregation.
    pub fn slice<T>(&self, items: Vec<T>) -> (Vec<T>, Pagination) {
        let total = items.len() as u64;
        let data = items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.per_page as usize)
            .collect();
        (data, self.pagination(total))
    }
}

/// `LOWER(col) LIKE %term%` over each column, OR-ed together.
///
/// Returns `None` for an absent or blank term so callers can skip the filter.
pub fn search_condition<I>(term: Option<&str>, columns: I) -> Option<Condition>
where
    I: IntoIterator<Item = ColumnRef>,
{
    let term = escape_like(term?.trim());
    if term.is_empty() {
        return None;
    }
    let pattern = format!("%{}%", term.to_lowercase());

    let condition = columns.into_iter().fold(Condition::any(), |cond, col| {
        cond.add(
            Expr::expr(Func::lower(Expr::col(col)))
                .like(LikeExpr::new(pattern.clone()).escape('\\')),
        )
    });
    Some(condition)
}

/// Count the rows matched by `select`, then fetch one page of them as `M`.
///
/// `select` should already carry its filters, ordering and projected
/// columns.
pub async fn fetch_page<C, E, M>(
    db: &C,
    select: Select<E>,
    page: &PageRequest,
) -> Result<(Vec<M>, Pagination), AppError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Send + Sync + 'static,
    M: FromQueryResult + Send + Sync,
{
    let total = select
        .clone()
        .paginate(db, page.per_page)
        .num_items()
        .await?;

    let data = select
        .offset(Some(page.offset()))
        .limit(Some(page.per_page))
        .into_model::<M>()
        .all(db)
        .await?;

    Ok((data, page.pagination(total)))
}
