use actix_web::{HttpResponse, web};

use crate::WgGateway;
use crate::extract::AuthAdmin;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/status", web::get().to(system_status));
}

#[tracing::instrument(skip_all)]
async fn system_status(_admin: AuthAdmin, gateway: web::Data<WgGateway>) -> HttpResponse {
    // Every probe degrades to "off"/absent on failure, so this never errors.
    HttpResponse::Ok().json(gateway.system_status().await)
}
