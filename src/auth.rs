use std::{fmt::Debug, ops::Deref};

use actix_web::{body, dev, http::{self, header::ContentType, StatusCode}, web, FromRequest, HttpRequest, HttpResponse};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::entity::user;

/// Bearer tokens carrying the whole user row
///
/// Tokens are issued by the admin console, this service only checks them.
pub struct Authority {
    jwt_key: DecodingKey,
}

impl Authority {
    pub fn new(jwt_key: &[u8]) -> Self {
        Self {
            jwt_key: DecodingKey::from_secret(jwt_key)
        }
    }

    pub fn authorize(&self, token: impl AsRef<str>) -> Result<user::Model, AuthError> {
        let payload = decode::<Claims<user::Model>>(token.as_ref(), &self.jwt_key, &Validation::default())?;
        let user = payload.claims.data;

        if !user.is_active || user.deleted_at.is_some() {
            return Err(AuthError::Inactive);
        }

        Ok(user)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims<T> {
    exp: i64,
    data: T,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authority error")]
    AuthorityError(#[from] jsonwebtoken::errors::Error),
    #[error("account is disabled")]
    Inactive,
}

impl actix_web::error::ResponseError for AuthError {
    fn error_response(&self) -> HttpResponse<body::BoxBody> {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }

    fn status_code(&self) -> http::StatusCode {
        match self {
            AuthError::AuthorityError(_) | AuthError::Inactive => StatusCode::FORBIDDEN,
        }
    }
}

impl FromRequest for user::Model {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            // Grabs the value after the scheme of `Authorization`
            // Example: Bearer sometoken
            //                 ^ grabs this value
            let Some(Ok(Some((_, token)))) = req.headers()
                .get("Authorization")
                .map(|v|
                    v.to_str()
                        .map(|str| str.split_once(" "))
                )
            else {
                return Err(actix_web::error::ErrorUnauthorized("unauthorized"))
            };

            let Some(authority) = req.app_data::<web::Data<Authority>>() else {
                return Err(actix_web::error::ErrorInternalServerError("authority is not configured"))
            };

            Ok(authority.authorize(token)?)
        })
    }
}

/// Caller allowed to manage payroll (admin or superadmin)
pub struct Admin(pub user::Model);

impl Deref for Admin {
    type Target = user::Model;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for Admin {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let user = user::Model::from_request(&req, &mut dev::Payload::None).await?;

            if !user.role.is_admin() {
                return Err(actix_web::error::ErrorForbidden("forbidden"))
            }

            Ok(Self(user))
        })
    }
}

/// Staff may only read their own records, admins may read anyone's
pub fn ensure_self_or_admin(user: &user::Model, owner_id: Uuid) -> Result<(), actix_web::Error> {
    if user.id == owner_id || user.role.is_admin() {
        Ok(())
    } else {
        Err(actix_web::error::ErrorForbidden("forbidden"))
    }
}
