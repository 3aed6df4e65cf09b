//! Login, logout and current-user endpoints
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::metrics;
use crate::middleware::auth::{
    clear_oauth_state_cookie, clear_session_cookie, oauth_state_cookie, session_cookie,
};
use crate::middleware::{AuthContext, OAUTH_STATE_COOKIE, SESSION_COOKIE};
use crate::models::PublicProfile;
use crate::services::SessionCredential;
use crate::state::AppState;

pub const LOGIN_FAILURE_REDIRECT: &str = "/login?error=auth_failed";

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /auth/facebook
pub async fn login(state: web::Data<AppState>) -> Result<HttpResponse> {
    let csrf_state = Uuid::new_v4().to_string();
    let url = state.provider.authorize_url(&csrf_state)?;

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, url))
        .cookie(oauth_state_cookie(&csrf_state, &state.config.session))
        .finish())
}

async fn complete_login(
    state: &AppState,
    req: &HttpRequest,
    query: CallbackQuery,
) -> Result<SessionCredential> {
    if let Some(provider_error) = query.error {
        return Err(AppError::OAuthProvider(format!(
            "provider returned error: {}",
            provider_error
        )));
    }

    let expected = req.cookie(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(got)) if !expected.is_empty() && expected == got => {}
        _ => return Err(AppError::Unauthenticated),
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidArgument("missing authorization code".into()))?;

    let identity = state.provider.exchange(&code).await?;
    let user = state.identity.resolve(&identity).await?;
    let credential = state.sessions.establish(&user).await?;
    info!(user_id = %user.id, "Login succeeded");
    Ok(credential)
}

/// GET /auth/facebook/callback
///
/// Every failure lands on the same redirect; the reason only goes to the log.
pub async fn callback(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<CallbackQuery>,
) -> HttpResponse {
    let settings = &state.config.session;

    match complete_login(&state, &req, query.into_inner()).await {
        Ok(credential) => {
            metrics::record_login("success");
            HttpResponse::Found()
                .insert_header((header::LOCATION, "/"))
                .cookie(session_cookie(
                    &credential.token,
                    credential.expires_at,
                    settings,
                ))
                .cookie(clear_oauth_state_cookie(settings))
                .finish()
        }
        Err(e) => {
            let outcome = match &e {
                AppError::MissingEmail => "missing_email",
                AppError::NoInvitation => "no_invitation",
                AppError::AccountDeactivated => "deactivated",
                AppError::Unauthenticated => "state_mismatch",
                _ => "error",
            };
            metrics::record_login(outcome);
            if e.is_internal() {
                error!(error = %e, "Login callback failed");
            } else {
                warn!(outcome, "Login rejected");
            }

            HttpResponse::Found()
                .insert_header((header::LOCATION, LOGIN_FAILURE_REDIRECT))
                .cookie(clear_oauth_state_cookie(settings))
                .finish()
        }
    }
}

/// POST /auth/logout
pub async fn logout(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
    state.sessions.terminate(token.as_deref()).await?;

    Ok(HttpResponse::Ok()
        .cookie(clear_session_cookie(&state.config.session))
        .json(json!({ "message": "Logged out successfully" })))
}

/// GET /api/auth/user
pub async fn current_user(auth: AuthContext) -> HttpResponse {
    HttpResponse::Ok().json(PublicProfile::from(&auth.user))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/facebook", web::get().to(login))
        .route("/auth/facebook/callback", web::get().to(callback))
        .route("/auth/logout", web::post().to(logout))
        .route("/api/auth/user", web::get().to(current_user));
}
