use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::AuthContext;
use crate::models::{CreateCustomerRequest, CreateNoteRequest, CustomerFilter, UpdateCustomerRequest};
use crate::state::AppState;

/// GET /api/customers?status=&region=&search=
pub async fn list_customers(
    state: web::Data<AppState>,
    _auth: AuthContext,
    filter: web::Query<CustomerFilter>,
) -> Result<HttpResponse> {
    let customers = state.customers.list(&filter).await?;
    Ok(HttpResponse::Ok().json(customers))
}

/// GET /api/customers/{id}
pub async fn get_customer(
    state: web::Data<AppState>,
    _auth: AuthContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let customer = state.customers.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(customer))
}

/// POST /api/customers
pub async fn create_customer(
    state: web::Data<AppState>,
    auth: AuthContext,
    body: web::Json<CreateCustomerRequest>,
) -> Result<HttpResponse> {
    let customer = state.customers.create(&auth.user, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(customer))
}

/// PUT /api/customers/{id}
pub async fn update_customer(
    state: web::Data<AppState>,
    auth: AuthContext,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCustomerRequest>,
) -> Result<HttpResponse> {
    let customer = state
        .customers
        .update(&auth.user, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(customer))
}

/// DELETE /api/customers/{id}
pub async fn delete_customer(
    state: web::Data<AppState>,
    auth: AuthContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    state.customers.delete(&auth.user, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/customers/{id}/notes
pub async fn list_notes(
    state: web::Data<AppState>,
    _auth: AuthContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let notes = state.customers.notes(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(notes))
}

/// POST /api/customers/{id}/notes
pub async fn create_note(
    state: web::Data<AppState>,
    auth: AuthContext,
    path: web::Path<Uuid>,
    body: web::Json<CreateNoteRequest>,
) -> Result<HttpResponse> {
    let note = state
        .customers
        .add_note(&auth.user, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(note))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/customers")
            .route(web::get().to(list_customers))
            .route(web::post().to(create_customer)),
    )
    .service(
        web::resource("/api/customers/{id}")
            .route(web::get().to(get_customer))
            .route(web::put().to(update_customer))
            .route(web::patch().to(update_customer))
            .route(web::delete().to(delete_customer)),
    )
    .service(
        web::resource("/api/customers/{id}/notes")
            .route(web::get().to(list_notes))
            .route(web::post().to(create_note)),
    );
}
