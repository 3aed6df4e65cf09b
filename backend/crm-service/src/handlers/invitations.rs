use actix_web::{web, HttpResponse};

use crate::error::Result;
use crate::middleware::AuthContext;
use crate::models::CreateInvitationRequest;
use crate::state::AppState;

/// GET /api/invitations
pub async fn list_invitations(
    state: web::Data<AppState>,
    _auth: AuthContext,
) -> Result<HttpResponse> {
    let invitations = state.invitations.list_invitations().await?;
    Ok(HttpResponse::Ok().json(invitations))
}

/// POST /api/invitations
///
/// The inviter is recorded by user id.
pub async fn create_invitation(
    state: web::Data<AppState>,
    auth: AuthContext,
    body: web::Json<CreateInvitationRequest>,
) -> Result<HttpResponse> {
    let invitation = state
        .invitations
        .create_invitation(&body.email, &auth.user.id.to_string())
        .await?;
    Ok(HttpResponse::Created().json(invitation))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/invitations")
            .route(web::get().to(list_invitations))
            .route(web::post().to(create_invitation)),
    );
}
