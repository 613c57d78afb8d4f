use actix_web::{post, web, Responder};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::{
    auth::Admin,
    payroll::{store::SeaOrmStore, PayrollEngine, PayrollError, RunMode, RunRequest, Trigger},
};

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(run_payroll);
}

#[derive(Debug, Serialize, Deserialize)]
struct RunPayroll {
    month: u32,
    year: i32,
    #[serde(default)]
    mode: RunMode,
    #[serde(default)]
    force: bool,
}

#[post("/run")]
async fn run_payroll(db: web::Data<DatabaseConnection>, admin: Admin, payload: web::Json<RunPayroll>) -> Result<impl Responder, PayrollError> {
    let engine = PayrollEngine::new(SeaOrmStore::new(db.into_inner()));

    let summary = engine.run(&RunRequest {
        month: payload.month,
        year: payload.year,
        mode: payload.mode,
        force: payload.force,
        trigger: Trigger::Web,
        actor: Some(admin.id),
    }).await?;

    Ok(web::Json(summary))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::{Method, StatusCode}, test, App};
    use sea_orm::{DatabaseBackend, MockDatabase};

    use crate::{auth::{tests::{bearer, user_with_role}, Authority}, entity::sea_orm_active_enums::RoleType};

    use super::*;

    #[actix_web::test]
    async fn test_run_payroll_validates_period() {
        let secret = b"secret";
        let admin = user_with_role(RoleType::Admin);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Authority::new(secret)))
                .app_data(web::Data::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection()))
                .service(web::scope("/payroll").configure(config))
        ).await;

        let req = test::TestRequest::default()
            .uri("/payroll/run")
            .method(Method::POST)
            .insert_header(bearer(secret, &admin))
            .set_json(RunPayroll { month: 13, year: 2025, mode: RunMode::Run, force: false })
            .to_request();

        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_run_payroll_requires_admin() {
        let secret = b"secret";

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Authority::new(secret)))
                .app_data(web::Data::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection()))
                .service(web::scope("/payroll").configure(config))
        ).await;

        for role in [RoleType::Staff, RoleType::Accountant] {
            let req = test::TestRequest::default()
                .uri("/payroll/run")
                .method(Method::POST)
                .insert_header(bearer(secret, &user_with_role(role)))
                .set_json(RunPayroll { month: 6, year: 2025, mode: RunMode::Preview, force: false })
                .to_request();

            let response = test::call_service(&app, req).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
    }

    #[actix_web::test]
    async fn test_mode_defaults_to_preview() {
        let payload: RunPayroll = serde_json::from_str(r#"{"month": 6, "year": 2025}"#).unwrap();

        assert_eq!(payload.mode, RunMode::Preview);
        assert!(!payload.force);
    }
}
