// Copyright (C) 2026 wgdash contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::WgGateway;
use crate::error::ApiError;
use crate::extract::AuthAdmin;

#[derive(Debug, Deserialize)]
struct CreateClientRequest {
    name: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/clients")
            .route(web::get().to(list_clients))
            .route(web::post().to(create_client)),
    )
    .service(web::resource("/api/clients/{name}").route(web::delete().to(delete_client)))
    .service(web::resource("/api/clients/{name}/qr").route(web::get().to(client_qr)));
}

#[tracing::instrument(skip_all)]
async fn list_clients(_admin: AuthAdmin, gateway: web::Data<WgGateway>) -> HttpResponse {
    let clients = gateway.list_clients().await;
    HttpResponse::Ok().json(serde_json::json!({ "clients": clients }))
}

#[tracing::instrument(skip_all)]
async fn create_client(
    _admin: AuthAdmin,
    gateway: web::Data<WgGateway>,
    body: web::Json<CreateClientRequest>,
) -> Result<HttpResponse, ApiError> {
    if body.name.is_empty() {
        return Err(ApiError::Validation("client name is required".into()));
    }

    let created = gateway.generate_client(&body.name).await?;
    Ok(HttpResponse::Created().json(created))
}

#[tracing::instrument(skip_all)]
async fn delete_client(
    _admin: AuthAdmin,
    gateway: web::Data<WgGateway>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let removed = gateway.remove_client(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(removed))
}

#[tracing::instrument(skip_all)]
async fn client_qr(
    _admin: AuthAdmin,
    gateway: web::Data<WgGateway>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let qr_data_url = gateway.client_qr(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "qr_data_url": qr_data_url })))
}
