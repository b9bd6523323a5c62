mod auth;
mod config;
mod error;
mod extract;
mod middleware;
mod ratelimit;
mod routes;

use std::sync::Arc;

use actix_web::{App, HttpResponse, HttpServer, web};
use tracing::info;
use wgdash_core::exec::SystemRunner;
use wgdash_core::gateway::Gateway;

use crate::config::Config;
use crate::ratelimit::{AttemptStore, MemoryAttemptStore};

/// The gateway type the HTTP layer talks to: real subprocesses.
pub(crate) type WgGateway = Gateway<SystemRunner>;

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(distribute)]
    {
        fmt().json().with_env_filter(filter).init();
    }

    #[cfg(not(distribute))]
    {
        fmt().pretty().with_env_filter(filter).init();
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().expect("failed to load configuration");
    info!(addr = %config.bind_addr, "starting wgdash-api");

    let gateway = Gateway::new(SystemRunner, config.gateway_settings());
    let attempts: Arc<dyn AttemptStore> = Arc::new(MemoryAttemptStore::default());

    let bind = config.bind_addr.clone();

    let config_data = web::Data::new(config);
    let gateway_data = web::Data::new(gateway);
    let attempts_data = web::Data::from(attempts);

    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(gateway_data.clone())
            .app_data(attempts_data.clone())
            .wrap(middleware::AccessLog)
            .route("/health", web::get().to(health))
            .configure(routes::auth::configure)
            .configure(routes::status::configure)
            .configure(routes::peers::configure)
            .configure(routes::clients::configure)
    })
    .bind(&bind)?
    .run()
    .await
}
