use actix_web::{get, post, web, Responder};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{ensure_self_or_admin, Admin},
    entity::user,
    payroll::{calendar::validate_period, tickets, PayrollError},
};

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(team_ticket_average)
        .service(ticket_percent);
}

#[derive(Debug, Serialize, Deserialize)]
struct TicketPercent {
    user_id: Uuid,
    month: u32,
    year: i32,
    ticket_percent: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
struct TeamTickets {
    user_ids: Vec<Uuid>,
    month: u32,
    year: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct TeamTicketAverage {
    month: u32,
    year: i32,
    members: usize,
    average: Decimal,
}

#[get("/{user_id}/{year}/{month}")]
async fn ticket_percent(
    db: web::Data<DatabaseConnection>,
    user: user::Model,
    path: web::Path<(Uuid, i32, u32)>,
) -> actix_web::Result<impl Responder> {
    let (user_id, year, month) = path.into_inner();

    ensure_self_or_admin(&user, user_id)?;
    validate_period(month, year)?;

    let ticket_percent = tickets::ticket_percent(db.get_ref(), user_id, month, year).await
        .map_err(PayrollError::from)?;

    Ok(web::Json(TicketPercent { user_id, month, year, ticket_percent }))
}

#[post("/team")]
async fn team_ticket_average(
    db: web::Data<DatabaseConnection>,
    _admin: Admin,
    payload: web::Json<TeamTickets>,
) -> Result<impl Responder, PayrollError> {
    validate_period(payload.month, payload.year)?;

    let average = tickets::team_ticket_average(db.get_ref(), &payload.user_ids, payload.month, payload.year).await?;

    Ok(web::Json(TeamTicketAverage {
        month: payload.month,
        year: payload.year,
        members: payload.user_ids.len(),
        average,
    }))
}
