//! Condense HTTP server
//!
//! Actix-web front end for the condensation pipeline.

pub mod routes;
pub mod state;
pub mod types;

use actix_cors::Cors;
use actix_web::{error::InternalError, http::header, http::StatusCode, web, App, HttpServer};
use condense_common::{AppConfig, Result};
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

pub use state::AppState;

/// Largest accepted form body
const MAX_FORM_BYTES: usize = 16 * 1024 * 1024;

/// Register routes and extractor settings
pub fn configure(cfg: &mut web::ServiceConfig) {
    let form_config = web::FormConfig::default()
        .limit(MAX_FORM_BYTES)
        .error_handler(|err, _req| {
            warn!("Rejected form data: {}", err);
            let response = routes::process::error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid form data: {}", err),
            );
            InternalError::from_response(err, response).into()
        });

    cfg.app_data(form_config)
        .service(routes::process::process)
        .service(routes::system::health);
}

fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["POST", "GET", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE])
        .max_age(3600)
}

/// Start the HTTP server and run until shutdown
pub async fn start_server(config: AppConfig) -> Result<()> {
    let bind_addr = config.server_bind_address();
    info!(
        "Server configuration: max_concurrent={}, chunk_size={}, chunk_overlap={}, request_timeout={:?}",
        config.max_concurrent, config.chunk_size, config.chunk_overlap, config.request_timeout
    );

    let state = web::Data::new(AppState::new(config)?);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(&bind_addr)?;

    info!("Server listening on http://{}", bind_addr);
    server.run().await?;

    info!("Server stopped");
    Ok(())
}
