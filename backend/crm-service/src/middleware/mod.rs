//! Request middleware and extractors

pub mod auth;

pub use auth::{AuthContext, OAUTH_STATE_COOKIE, SESSION_COOKIE};
