use actix_web::web;

mod advances;
mod auth;
mod payroll;
mod progress;
mod tickets;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(web::scope("/auth")
            .configure(auth::config))
        .service(web::scope("/tickets")
            .configure(tickets::config))
        .service(web::scope("/progress")
            .configure(progress::config))
        .service(web::scope("/payroll")
            .configure(payroll::config))
        .service(web::scope("/advances")
            .configure(advances::config));
}
