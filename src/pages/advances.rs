use std::str::FromStr;

use actix_web::{dev, post, web, FromRequest, HttpRequest, HttpResponse, Responder};
use chrono::Local;
use futures_util::future::LocalBoxFuture;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::{Set, Unchanged}, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::Admin,
    consts::MONEY_DP,
    entity::{
        advance_auto_deduction, advance_request, prelude::*,
        sea_orm_active_enums::{AdvanceStatus, DeductionStatus},
        user,
    },
    payroll::{advance::ScheduleTerms, PayrollError},
    utils,
};

use extractor::PendingAdvance;
use model::*;

mod extractor;
mod model;

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(create_advance)
        .service(decide_advance);
}

#[post("")]
async fn create_advance(db: web::Data<DatabaseConnection>, user: user::Model, payload: web::Json<CreateAdvance>) -> Result<HttpResponse, PayrollError> {
    let amount = utils::round(payload.amount, MONEY_DP);
    if amount <= Decimal::ZERO {
        return Err(PayrollError::Validation("amount must be positive".to_owned()));
    }

    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(PayrollError::Validation("reason is required".to_owned()));
    }

    let model = AdvanceRequest::insert(advance_request::ActiveModel {
        created_at: Set(Local::now().fixed_offset()),
        updated_at: Set(Local::now().fixed_offset()),
        created_by: Set(Some(user.id)),
        updated_by: Set(Some(user.id)),
        user_id: Set(user.id),
        amount: Set(amount),
        reason: Set(reason.to_owned()),
        status: Set(AdvanceStatus::Pending),
        ..Default::default()
    }).exec_with_returning(db.get_ref()).await?;

    info!(advance_id = %model.id, user_id = %user.id, %amount, "Advance requested");

    Ok(HttpResponse::Created().json(web::Json(model)))
}

/// Approves or rejects a pending request, an approval with a monthly
/// installment also opens or extends the user's deduction schedule
#[post("/{advance_id}/decision")]
async fn decide_advance(
    db: web::Data<DatabaseConnection>,
    admin: Admin,
    advance: PendingAdvance,
    payload: web::Json<Decision>,
) -> Result<impl Responder, PayrollError> {
    let monthly_deduction = match (payload.decision, payload.monthly_deduction) {
        (Verdict::Reject, Some(_)) => {
            return Err(PayrollError::Validation("monthly_deduction only applies to approvals".to_owned()));
        },
        (_, Some(monthly)) if monthly <= Decimal::ZERO => {
            return Err(PayrollError::Validation("monthly_deduction must be positive".to_owned()));
        },
        (_, monthly) => monthly.map(|m| utils::round(m, MONEY_DP)),
    };

    let status = match payload.decision {
        Verdict::Approve => AdvanceStatus::Approved,
        Verdict::Reject => AdvanceStatus::Rejected,
    };

    let now = Local::now().fixed_offset();
    let txn = db.begin().await?;

    // Scheduled users never reach the legacy recovery, their approvals need an installment
    if payload.decision == Verdict::Approve && monthly_deduction.is_none() {
        let scheduled = AdvanceAutoDeduction::find()
            .filter(advance_auto_deduction::Column::UserId.eq(advance.user_id))
            .one(&txn).await?;

        if scheduled.is_some() {
            return Err(PayrollError::Validation(
                "monthly_deduction is required for a user with a deduction schedule".to_owned(),
            ));
        }
    }

    // Only the request still pending at write time gets decided
    let Some(decided) = AdvanceRequest::update_many()
        .set(advance_request::ActiveModel {
            updated_at: Set(now),
            updated_by: Set(Some(admin.id)),
            status: Set(status),
            approved_by: Set(Some(admin.id)),
            approved_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(advance_request::Column::Id.eq(advance.id))
        .filter(advance_request::Column::Status.eq(AdvanceStatus::Pending))
        .exec_with_returning(&txn).await?
        .pop()
    else {
        return Err(PayrollError::Validation("advance request is already decided".to_owned()));
    };

    let schedule = match monthly_deduction {
        Some(monthly) => {
            let current = AdvanceAutoDeduction::find()
                .filter(advance_auto_deduction::Column::UserId.eq(advance.user_id))
                .filter(advance_auto_deduction::Column::Status.eq(DeductionStatus::Active))
                .order_by_desc(advance_auto_deduction::Column::CreatedAt)
                .lock_exclusive()
                .one(&txn).await?;

            let terms = ScheduleTerms::extend(current.as_ref(), advance.amount, monthly);

            let model = match current {
                Some(current) => AdvanceAutoDeduction::update(advance_auto_deduction::ActiveModel {
                    id: Unchanged(current.id),
                    updated_at: Set(now),
                    total_advance: Set(terms.total_advance),
                    monthly_deduction: Set(terms.monthly_deduction),
                    remaining_due: Set(terms.remaining_due),
                    ..Default::default()
                }).exec(&txn).await?,
                None => AdvanceAutoDeduction::insert(advance_auto_deduction::ActiveModel {
                    created_at: Set(now),
                    updated_at: Set(now),
                    user_id: Set(advance.user_id),
                    total_advance: Set(terms.total_advance),
                    monthly_deduction: Set(terms.monthly_deduction),
                    remaining_due: Set(terms.remaining_due),
                    status: Set(DeductionStatus::Active),
                    ..Default::default()
                }).exec_with_returning(&txn).await?,
            };

            Some(model)
        },
        None => None,
    };

    txn.commit().await?;

    info!(
        advance_id = %decided.id,
        status = ?decided.status,
        schedule = ?schedule.as_ref().map(|s| s.id),
        "Advance decided"
    );

    Ok(web::Json(DecisionOutcome {
        advance: decided,
        schedule,
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::{Method, StatusCode}, test, App};
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    use crate::{auth::{tests::{bearer, user_with_role}, Authority}, entity::sea_orm_active_enums::RoleType};

    use super::*;

    pub(super) fn advance(user_id: Uuid, status: AdvanceStatus) -> advance_request::Model {
        advance_request::Model {
            id: Uuid::new_v4(),
            created_at: Local::now().into(),
            updated_at: Local::now().into(),
            created_by: Some(user_id),
            updated_by: Some(user_id),
            user_id,
            amount: dec!(1000),
            reason: "rent".to_owned(),
            status,
            approved_by: None,
            approved_at: None,
        }
    }

    fn schedule(user_id: Uuid, total: Decimal, monthly: Decimal, remaining: Decimal) -> advance_auto_deduction::Model {
        advance_auto_deduction::Model {
            id: Uuid::new_v4(),
            created_at: Local::now().into(),
            updated_at: Local::now().into(),
            user_id,
            total_advance: total,
            monthly_deduction: monthly,
            remaining_due: remaining,
            status: DeductionStatus::Active,
        }
    }

    #[actix_web::test]
    async fn test_create_advance() {
        let secret = b"secret";
        let staff = user_with_role(RoleType::Staff);
        let created = advance(staff.id, AdvanceStatus::Pending);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![ created.clone() ]]);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Authority::new(secret)))
                .app_data(web::Data::new(db.into_connection()))
                .service(web::scope("/advances").configure(config))
        ).await;

        let req = test::TestRequest::default()
            .uri("/advances")
            .method(Method::POST)
            .insert_header(bearer(secret, &staff))
            .set_json(CreateAdvance { amount: dec!(1000), reason: "rent".to_owned() })
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        for (amount, reason) in [(dec!(0), "rent"), (dec!(-5), "rent"), (dec!(100), "   ")] {
            let req = test::TestRequest::default()
                .uri("/advances")
                .method(Method::POST)
                .insert_header(bearer(secret, &staff))
                .set_json(CreateAdvance { amount, reason: reason.to_owned() })
                .to_request();

            let response = test::call_service(&app, req).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[actix_web::test]
    async fn test_approve_opens_schedule() {
        let secret = b"secret";
        let admin = user_with_role(RoleType::Admin);
        let staff = user_with_role(RoleType::Staff);
        let pending = advance(staff.id, AdvanceStatus::Pending);

        let mut approved = pending.clone();
        approved.status = AdvanceStatus::Approved;
        approved.approved_by = Some(admin.id);

        let opened = schedule(staff.id, dec!(1000), dec!(250), dec!(1000));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![ pending.clone() ]])
            .append_query_results([vec![ approved.clone() ]])
            .append_query_results::<advance_auto_deduction::Model, _, _>([vec![]])
            .append_query_results([vec![ opened.clone() ]]);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Authority::new(secret)))
                .app_data(web::Data::new(db.into_connection()))
                .service(web::scope("/advances").configure(config))
        ).await;

        let req = test::TestRequest::default()
            .uri(&format!("/advances/{}/decision", pending.id))
            .method(Method::POST)
            .insert_header(bearer(secret, &admin))
            .set_json(Decision { decision: Verdict::Approve, monthly_deduction: Some(dec!(250)) })
            .to_request();

        let outcome: DecisionOutcome = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome.advance.status, AdvanceStatus::Approved);
        assert_eq!(outcome.schedule.map(|s| s.remaining_due), Some(dec!(1000)));
    }

    #[actix_web::test]
    async fn test_approve_extends_schedule() {
        let secret = b"secret";
        let admin = user_with_role(RoleType::Superadmin);
        let staff = user_with_role(RoleType::Staff);
        let pending = advance(staff.id, AdvanceStatus::Pending);

        let mut approved = pending.clone();
        approved.status = AdvanceStatus::Approved;

        let running = schedule(staff.id, dec!(600), dec!(200), dec!(400));
        let mut extended = running.clone();
        extended.total_advance = dec!(1600);
        extended.monthly_deduction = dec!(300);
        extended.remaining_due = dec!(1400);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![ pending.clone() ]])
            .append_query_results([vec![ approved ]])
            .append_query_results([vec![ running ]])
            .append_query_results([vec![ extended ]]);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Authority::new(secret)))
                .app_data(web::Data::new(db.into_connection()))
                .service(web::scope("/advances").configure(config))
        ).await;

        let req = test::TestRequest::default()
            .uri(&format!("/advances/{}/decision", pending.id))
            .method(Method::POST)
            .insert_header(bearer(secret, &admin))
            .set_json(Decision { decision: Verdict::Approve, monthly_deduction: Some(dec!(300)) })
            .to_request();

        let outcome: DecisionOutcome = test::call_and_read_body_json(&app, req).await;
        let schedule = outcome.schedule.unwrap();
        assert_eq!(schedule.total_advance, dec!(1600));
        assert_eq!(schedule.remaining_due, dec!(1400));
    }

    #[actix_web::test]
    async fn test_approve_without_installment() {
        let secret = b"secret";
        let admin = user_with_role(RoleType::Admin);
        let staff = user_with_role(RoleType::Staff);
        let pending = advance(staff.id, AdvanceStatus::Pending);

        let mut approved = pending.clone();
        approved.status = AdvanceStatus::Approved;

        let mut finished = schedule(staff.id, dec!(600), dec!(200), dec!(0));
        finished.status = DeductionStatus::Completed;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // Never scheduled, left to the legacy recovery
            .append_query_results([vec![ pending.clone() ]])
            .append_query_results::<advance_auto_deduction::Model, _, _>([vec![]])
            .append_query_results([vec![ approved ]])
            // Had a schedule, the installment is mandatory
            .append_query_results([vec![ pending.clone() ]])
            .append_query_results([vec![ finished ]]);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Authority::new(secret)))
                .app_data(web::Data::new(db.into_connection()))
                .service(web::scope("/advances").configure(config))
        ).await;

        let req = test::TestRequest::default()
            .uri(&format!("/advances/{}/decision", pending.id))
            .method(Method::POST)
            .insert_header(bearer(secret, &admin))
            .set_json(Decision { decision: Verdict::Approve, monthly_deduction: None })
            .to_request();

        let outcome: DecisionOutcome = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome.advance.status, AdvanceStatus::Approved);
        assert!(outcome.schedule.is_none());

        let req = test::TestRequest::default()
            .uri(&format!("/advances/{}/decision", pending.id))
            .method(Method::POST)
            .insert_header(bearer(secret, &admin))
            .set_json(Decision { decision: Verdict::Approve, monthly_deduction: None })
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_concurrent_decision_is_refused() {
        let secret = b"secret";
        let admin = user_with_role(RoleType::Admin);
        let staff = user_with_role(RoleType::Staff);
        let pending = advance(staff.id, AdvanceStatus::Pending);

        // Pending when loaded, decided by another admin before the write
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![ pending.clone() ]])
            .append_query_results::<advance_request::Model, _, _>([vec![]]);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Authority::new(secret)))
                .app_data(web::Data::new(db.into_connection()))
                .service(web::scope("/advances").configure(config))
        ).await;

        let req = test::TestRequest::default()
            .uri(&format!("/advances/{}/decision", pending.id))
            .method(Method::POST)
            .insert_header(bearer(secret, &admin))
            .set_json(Decision { decision: Verdict::Approve, monthly_deduction: Some(dec!(250)) })
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_reject_and_validation() {
        let secret = b"secret";
        let admin = user_with_role(RoleType::Admin);
        let staff = user_with_role(RoleType::Staff);
        let pending = advance(staff.id, AdvanceStatus::Pending);

        let mut rejected = pending.clone();
        rejected.status = AdvanceStatus::Rejected;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // Reject with an installment, refused before any write
            .append_query_results([vec![ pending.clone() ]])
            // Plain reject
            .append_query_results([vec![ pending.clone() ]])
            .append_query_results([vec![ rejected ]]);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Authority::new(secret)))
                .app_data(web::Data::new(db.into_connection()))
                .service(web::scope("/advances").configure(config))
        ).await;

        let req = test::TestRequest::default()
            .uri(&format!("/advances/{}/decision", pending.id))
            .method(Method::POST)
            .insert_header(bearer(secret, &admin))
            .set_json(Decision { decision: Verdict::Reject, monthly_deduction: Some(dec!(100)) })
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::default()
            .uri(&format!("/advances/{}/decision", pending.id))
            .method(Method::POST)
            .insert_header(bearer(secret, &admin))
            .set_json(Decision { decision: Verdict::Reject, monthly_deduction: None })
            .to_request();

        let outcome: DecisionOutcome = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome.advance.status, AdvanceStatus::Rejected);
        assert!(outcome.schedule.is_none());

        // Staff cannot decide
        let req = test::TestRequest::default()
            .uri(&format!("/advances/{}/decision", pending.id))
            .method(Method::POST)
            .insert_header(bearer(secret, &staff))
            .set_json(Decision { decision: Verdict::Approve, monthly_deduction: None })
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
