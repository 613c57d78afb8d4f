use std::ops::Deref;

use super::*;

impl FromRequest for advance_request::Model {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let Some(Ok(advance_id)) = req.match_info().get("advance_id").map(Uuid::from_str) else {
                return Err(actix_web::error::ErrorBadRequest("invalid `advance_id`"))
            };

            let Some(db) = req.app_data::<web::Data<DatabaseConnection>>() else {
                return Err(actix_web::error::ErrorInternalServerError("database is not configured"))
            };

            let Some(advance) = AdvanceRequest::find_by_id(advance_id)
                .one(db.as_ref()).await
                .map_err(PayrollError::from)?
            else {
                return Err(actix_web::error::ErrorNotFound("advance request not found"))
            };

            Ok(advance)
        })
    }
}

/// Advance request still waiting for a decision
pub(super) struct PendingAdvance(pub(super) advance_request::Model);

impl Deref for PendingAdvance {
    type Target = advance_request::Model;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for PendingAdvance {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let advance = advance_request::Model::from_request(&req, &mut dev::Payload::None).await?;

            if advance.status != AdvanceStatus::Pending {
                return Err(actix_web::error::ErrorBadRequest("advance request is already decided"));
            }

            Ok(Self(advance))
        })
    }
}
