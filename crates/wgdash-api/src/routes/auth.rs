use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use crate::auth::{clear_auth_cookie, create_token, set_auth_cookie, verify_password};
use crate::config::Config;
use crate::error::ApiError;
use crate::extract::AuthAdmin;
use crate::ratelimit::AttemptStore;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me)),
    );
}

fn client_key(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

#[tracing::instrument(skip_all)]
async fn login(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    config: web::Data<Config>,
    attempts: web::Data<dyn AttemptStore>,
) -> Result<HttpResponse, ApiError> {
    let key = client_key(&req);

    if let Some(retry_after) = attempts.blocked(&key) {
        tracing::info!(remote_ip = %key, "login rate limited");
        return Err(ApiError::TooManyAttempts {
            retry_after_secs: retry_after.as_secs().max(1),
        });
    }

    if body.username != config.admin_user
        || !verify_password(&body.password, &config.admin_pass_hash)
    {
        attempts.record(&key);
        tracing::info!(username = %body.username, "login failed");
        return Err(ApiError::InvalidCredentials);
    }

    attempts.clear(&key);
    let token = create_token(&body.username, &config.jwt_secret)?;
    tracing::info!(username = %body.username, "login success");

    Ok(HttpResponse::Ok()
        .cookie(set_auth_cookie(&token))
        .json(serde_json::json!({ "status": "ok", "username": body.username })))
}

#[tracing::instrument(skip_all)]
async fn logout(_admin: AuthAdmin) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(clear_auth_cookie())
        .json(serde_json::json!({ "status": "ok" }))
}

#[tracing::instrument(skip_all)]
async fn me(admin: AuthAdmin) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "username": admin.username }))
}
