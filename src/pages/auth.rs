use actix_web::{get, web, Responder};

use crate::entity::user;

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(whoami);
}

#[get("")]
async fn whoami(user: user::Model) -> impl Responder {
    web::Json(user)
}
