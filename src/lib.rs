//! HTTP service that loads a gradient-boosted dropout model and its feature
//! list at startup and reports their presence on `GET /health`.

pub mod artifacts;
pub mod booster;
pub mod config;
pub mod error;
pub mod features;
pub mod handlers;
pub mod models;

use actix_cors::Cors;
use actix_web::web;

/// Routes served by the application.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)));
}

/// Wide-open CORS policy: any origin, method and header, with credentials.
/// Restrict before exposing the service publicly.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
}
