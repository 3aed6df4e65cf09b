use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::AuthContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

/// GET /api/team-activity?limit=
pub async fn team_activity(
    state: web::Data<AppState>,
    _auth: AuthContext,
    query: web::Query<ActivityQuery>,
) -> Result<HttpResponse> {
    let entries = state.activity.recent(query.limit).await?;
    Ok(HttpResponse::Ok().json(entries))
}

/// GET /api/analytics
pub async fn analytics(state: web::Data<AppState>, _auth: AuthContext) -> Result<HttpResponse> {
    let analytics = state.customers.analytics().await?;
    Ok(HttpResponse::Ok().json(analytics))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/team-activity", web::get().to(team_activity))
        .route("/api/analytics", web::get().to(analytics));
}
