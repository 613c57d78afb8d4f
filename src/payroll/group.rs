use rust_decimal::Decimal;
use sea_orm::{sea_query::{Expr, Func, SimpleExpr}, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::{entity::{daily_progress, prelude::*, user}, payroll::calendar::month_bounds};

/// Average daily progress of a team's active members over one month
///
/// Teams without active members and months without entries average to 0.
pub async fn group_average(db: &impl ConnectionTrait, team_id: Uuid, month: u32, year: i32) -> Result<Decimal, DbErr> {
    let Some((start, end)) = month_bounds(month, year) else {
        return Ok(Decimal::ZERO);
    };

    let members: Vec<Uuid> = User::find()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::TeamId.eq(team_id))
        .filter(user::Column::IsActive.eq(true))
        .filter(user::Column::DeletedAt.is_null())
        .into_tuple()
        .all(db).await?;

    if members.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let average: Option<Option<Decimal>> = DailyProgress::find()
        .select_only()
        .column_as(
            SimpleExpr::FunctionCall(Func::avg(Expr::col(daily_progress::Column::ProgressPercent))),
            "average",
        )
        .filter(daily_progress::Column::UserId.is_in(members))
        .filter(daily_progress::Column::Date.between(start, end))
        .into_tuple()
        .one(db).await?;

    Ok(average.flatten().unwrap_or(Decimal::ZERO))
}
