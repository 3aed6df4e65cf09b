//! Session-cookie authentication
//!
//! `AuthContext` is the only way a handler obtains the caller. Extraction
//! runs the session guard, so a handler that takes it can never run for an
//! unauthenticated or deactivated member.
use std::future::Future;
use std::pin::Pin;

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use chrono::{DateTime, Utc};

use crate::config::SessionSettings;
use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "crm_session";
pub const OAUTH_STATE_COOKIE: &str = "crm_oauth_state";

const OAUTH_STATE_TTL_SECONDS: i64 = 600;

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

impl FromRequest for AuthContext {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());

        Box::pin(async move {
            let state = state
                .ok_or_else(|| AppError::Internal("application state not configured".into()))?;
            let user = state.sessions.authorize(token.as_deref()).await?;
            Ok(AuthContext { user })
        })
    }
}

pub fn session_cookie(
    token: &str,
    expires_at: DateTime<Utc>,
    settings: &SessionSettings,
) -> Cookie<'static> {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .secure(settings.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(max_age))
        .finish()
}

pub fn clear_session_cookie(settings: &SessionSettings) -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .secure(settings.cookie_secure)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}

pub fn oauth_state_cookie(state: &str, settings: &SessionSettings) -> Cookie<'static> {
    Cookie::build(OAUTH_STATE_COOKIE, state.to_string())
        .path("/auth")
        .http_only(true)
        .secure(settings.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(OAUTH_STATE_TTL_SECONDS))
        .finish()
}

pub fn clear_oauth_state_cookie(settings: &SessionSettings) -> Cookie<'static> {
    let mut cookie = Cookie::build(OAUTH_STATE_COOKIE, "")
        .path("/auth")
        .http_only(true)
        .secure(settings.cookie_secure)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}
