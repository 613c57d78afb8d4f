use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{consts::MONEY_DP, entity::{monthly_ticket_total, prelude::*, staff_ticket_count}, utils};

/// Share of the month's tickets handled by one staff member, in percent
pub fn ticket_percent_of(ticket_count: i32, total_tickets: i32) -> Decimal {
    if total_tickets <= 0 {
        return Decimal::ZERO;
    }

    utils::round(Decimal::from(ticket_count) / Decimal::from(total_tickets) * dec!(100), MONEY_DP)
}

pub async fn ticket_percent(db: &impl ConnectionTrait, user_id: Uuid, month: u32, year: i32) -> Result<Decimal, DbErr> {
    let total = MonthlyTicketTotal::find()
        .filter(monthly_ticket_total::Column::Month.eq(month as i32))
        .filter(monthly_ticket_total::Column::Year.eq(year))
        .one(db).await?;

    let Some(total) = total.filter(|t| t.total_tickets > 0) else {
        return Ok(Decimal::ZERO);
    };

    let ticket_count = StaffTicketCount::find()
        .filter(staff_ticket_count::Column::UserId.eq(user_id))
        .filter(staff_ticket_count::Column::Month.eq(month as i32))
        .filter(staff_ticket_count::Column::Year.eq(year))
        .one(db).await?
        .map(|count| count.ticket_count)
        .unwrap_or(0);

    Ok(ticket_percent_of(ticket_count, total.total_tickets))
}

/// Plain mean of every member's ticket percentage
pub async fn team_ticket_average(db: &impl ConnectionTrait, user_ids: &[Uuid], month: u32, year: i32) -> Result<Decimal, DbErr> {
    if user_ids.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let mut sum = Decimal::ZERO;
    for user_id in user_ids {
        sum += ticket_percent(db, *user_id, month, year).await?;
    }

    Ok(sum / Decimal::from(user_ids.len()))
}
