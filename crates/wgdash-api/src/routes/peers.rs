use actix_web::{HttpResponse, web};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use wgdash_core::status::RuntimePeer;

use crate::WgGateway;
use crate::error::ApiError;
use crate::extract::AuthAdmin;

/// Runtime peer joined with its provisioned client name, or `Unknown` for
/// peers added outside the dashboard.
#[derive(Debug, Serialize)]
struct NamedPeer {
    name: String,
    #[serde(flatten)]
    peer: RuntimePeer,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/peers", web::get().to(list_peers))
        .route("/api/peers/{key}/disconnect", web::post().to(disconnect));
}

#[tracing::instrument(skip_all)]
async fn list_peers(_admin: AuthAdmin, gateway: web::Data<WgGateway>) -> HttpResponse {
    let show = gateway.peers().await;
    let names = gateway.client_map().await;

    let peers: Vec<NamedPeer> = show
        .peers
        .into_iter()
        .map(|peer| NamedPeer {
            name: names
                .get(&peer.public_key)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            peer,
        })
        .collect();

    HttpResponse::Ok().json(serde_json::json!({ "iface": show.iface, "peers": peers }))
}

/// A WireGuard public key is base64 of exactly 32 bytes. Anything else
/// never reaches a subprocess argument.
pub(crate) fn valid_public_key(key: &str) -> bool {
    STANDARD.decode(key).is_ok_and(|bytes| bytes.len() == 32)
}

#[tracing::instrument(skip_all)]
async fn disconnect(
    _admin: AuthAdmin,
    gateway: web::Data<WgGateway>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let key = path.into_inner();
    if !valid_public_key(&key) {
        return Err(ApiError::Validation("invalid public key format".into()));
    }

    gateway.disconnect_peer(&key).await?;
    tracing::info!(public_key = %key, "peer disconnected");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ok", "message": "peer disconnected" })))
}
