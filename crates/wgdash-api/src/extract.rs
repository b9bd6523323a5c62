use std::future::{Ready, ready};

use actix_web::dev::Payload;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};

use crate::auth::validate_token;
use crate::config::Config;
use crate::error::ApiError;

/// Proof that the request carries a valid admin session cookie. Every
/// gated handler takes one.
#[derive(Debug)]
pub struct AuthAdmin {
    pub username: String,
}

impl FromRequest for AuthAdmin {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_admin(req))
    }
}

fn extract_admin(req: &HttpRequest) -> Result<AuthAdmin, ApiError> {
    let config = req.app_data::<Data<Config>>().ok_or(ApiError::Internal)?;

    let cookie = req.cookie("token").ok_or(ApiError::Unauthorized)?;
    let claims = validate_token(cookie.value(), &config.jwt_secret)?;

    Ok(AuthAdmin {
        username: claims.sub,
    })
}
