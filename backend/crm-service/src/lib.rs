//! CRM Service Library
//!
//! Invitation-gated team CRM with real-time change propagation.
//!
//! ## Modules
//!
//! - `config`: Service configuration
//! - `db`: Storage traits with PostgreSQL and in-memory implementations
//! - `error`: Error types and HTTP mapping
//! - `handlers`: HTTP handlers and route registration
//! - `middleware`: Session-cookie authentication extractor
//! - `models`: Data models
//! - `services`: Invitation ledger, identity resolution, sessions, activity, customers
//! - `websocket`: Change broadcaster and WebSocket session actor
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod websocket;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
pub use websocket::{ChangeBroadcaster, ChangeEvent};
