//! HTTP handlers for the CRM API
pub mod activity;
pub mod auth;
pub mod customers;
pub mod export;
pub mod invitations;
pub mod websocket;

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::AppError;
use crate::metrics;

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Register every route plus extractor error handling.
///
/// Malformed JSON bodies, query strings and path segments become
/// `InvalidArgument` responses instead of actix's plain-text errors.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(256 * 1024)
            .error_handler(|err, _req| AppError::InvalidArgument(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::InvalidArgument(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::InvalidArgument(err.to_string()).into()),
    )
    .route("/health", web::get().to(health))
    .route("/metrics", web::get().to(metrics::serve_metrics));

    auth::register_routes(cfg);
    customers::register_routes(cfg);
    activity::register_routes(cfg);
    invitations::register_routes(cfg);
    export::register_routes(cfg);
    websocket::register_routes(cfg);
}
