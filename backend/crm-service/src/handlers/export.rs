use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};

use crate::error::Result;
use crate::middleware::AuthContext;
use crate::services::export::EXPORT_FILENAME;
use crate::state::AppState;

/// GET /api/export
pub async fn export_customers(
    state: web::Data<AppState>,
    auth: AuthContext,
) -> Result<HttpResponse> {
    let csv = state.customers.export_csv(&auth.user).await?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(EXPORT_FILENAME.to_string())],
        })
        .body(csv))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/export", web::get().to(export_customers));
}
