use actix_web::{body, http::{header::ContentType, StatusCode}, HttpResponse};
use sea_orm::DbErr;
use thiserror::Error;

use crate::payroll::progress::ProgressError;

#[derive(Debug, Error)]
pub enum PayrollError {
    #[error("{0}")]
    Validation(String),

    #[error("payroll for {month:02}/{year} is already processed; use force rerun")]
    AlreadyProcessed { month: u32, year: i32 },

    #[error("database error: {0}")]
    Persistence(#[from] DbErr),
}

impl From<ProgressError> for PayrollError {
    fn from(err: ProgressError) -> Self {
        PayrollError::Validation(err.to_string())
    }
}

impl actix_web::error::ResponseError for PayrollError {
    fn error_response(&self) -> HttpResponse<body::BoxBody> {
        let message = match self {
            // Database details stay in the logs
            PayrollError::Persistence(_) => "payroll could not be saved".to_owned(),
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(message)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PayrollError::Validation(_) => StatusCode::BAD_REQUEST,
            PayrollError::AlreadyProcessed { .. } => StatusCode::CONFLICT,
            PayrollError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
