use actix_web::{get, post, web, HttpResponse, Responder};
use chrono::{Datelike as _, Local};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue::{Set, Unchanged}, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::Admin,
    entity::{daily_progress, prelude::*, user},
    payroll::{
        calendar::{days_in_month, per_day_percent, validate_period},
        group::group_average,
        progress::{self, DailyInput},
        settings::{load_overrides, PayrollSettings},
        PayrollError,
    },
};

use model::*;

mod model;

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(preview_progress)
        .service(save_progress)
        .service(team_average)
        .service(calendar);
}

#[post("/preview")]
async fn preview_progress(db: web::Data<DatabaseConnection>, _admin: Admin, payload: web::Json<DailyInput>) -> Result<impl Responder, PayrollError> {
    validate_period(payload.date.month(), payload.date.year())?;

    let settings = PayrollSettings::load(db.get_ref()).await?;
    let overrides = load_overrides(db.get_ref(), payload.customer_ids()).await?;

    let result = progress::calculate_daily_progress(&payload, &settings, &overrides)?;

    Ok(web::Json(result))
}

#[post("")]
async fn save_progress(db: web::Data<DatabaseConnection>, admin: Admin, payload: web::Json<SaveProgress>) -> Result<HttpResponse, PayrollError> {
    let SaveProgress { user_id, notes, input } = payload.into_inner();

    validate_period(input.date.month(), input.date.year())?;

    let Ok(tickets_missed) = i32::try_from(input.tickets_missed) else {
        return Err(PayrollError::Validation("tickets_missed is too large".to_owned()));
    };

    let Some(_) = User::find_by_id(user_id).one(db.get_ref()).await? else {
        return Err(PayrollError::Validation(format!("unknown user {user_id}")));
    };

    let settings = PayrollSettings::load(db.get_ref()).await?;
    let overrides = load_overrides(db.get_ref(), input.customer_ids()).await?;
    let result = progress::calculate_daily_progress(&input, &settings, &overrides)?;

    let existing = DailyProgress::find()
        .filter(daily_progress::Column::UserId.eq(user_id))
        .filter(daily_progress::Column::Date.eq(input.date))
        .one(db.get_ref()).await?;

    let now = Local::now().fixed_offset();

    match existing {
        Some(entry) => {
            let model = DailyProgress::update(daily_progress::ActiveModel {
                id: Unchanged(entry.id),
                updated_at: Set(now),
                updated_by: Set(Some(admin.id)),
                tickets_missed: Set(tickets_missed),
                groups_status: Set(json!(input.groups)),
                is_missed: Set(input.is_missed),
                is_overtime: Set(input.is_overtime),
                progress_percent: Set(result.progress_percent),
                notes: Set(notes),
                customer_id: Set(input.customer_id),
                ..Default::default()
            }).exec(db.get_ref()).await?;

            info!(%user_id, date = %input.date, progress = %model.progress_percent, "Updated daily progress");

            Ok(HttpResponse::Ok().json(web::Json(model)))
        },
        None => {
            let model = DailyProgress::insert(daily_progress::ActiveModel {
                created_at: Set(now),
                updated_at: Set(now),
                created_by: Set(Some(admin.id)),
                updated_by: Set(Some(admin.id)),
                user_id: Set(user_id),
                date: Set(input.date),
                tickets_missed: Set(tickets_missed),
                groups_status: Set(json!(input.groups)),
                is_missed: Set(input.is_missed),
                is_overtime: Set(input.is_overtime),
                progress_percent: Set(result.progress_percent),
                notes: Set(notes),
                customer_id: Set(input.customer_id),
                ..Default::default()
            }).exec_with_returning(db.get_ref()).await?;

            info!(%user_id, date = %input.date, progress = %model.progress_percent, "Recorded daily progress");

            Ok(HttpResponse::Created().json(web::Json(model)))
        },
    }
}

#[get("/team/{team_id}/{year}/{month}")]
async fn team_average(
    db: web::Data<DatabaseConnection>,
    _admin: Admin,
    path: web::Path<(Uuid, i32, u32)>,
) -> Result<impl Responder, PayrollError> {
    let (team_id, year, month) = path.into_inner();

    validate_period(month, year)?;

    let average = group_average(db.get_ref(), team_id, month, year).await?;

    Ok(web::Json(TeamAverage { team_id, month, year, average }))
}

#[get("/calendar/{year}/{month}")]
async fn calendar(_user: user::Model, path: web::Path<(i32, u32)>) -> Result<impl Responder, PayrollError> {
    let (year, month) = path.into_inner();

    validate_period(month, year)?;

    Ok(web::Json(CalendarInfo {
        month,
        year,
        days_in_month: days_in_month(month, year),
        per_day_percent: per_day_percent(month, year),
    }))
}
