//! HTTP status surface serving the health table.

use actix_web::{HttpResponse, Responder, get, web};
use uptime::HealthTable;

use crate::error::AppError;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(node_info_route).service(health_route);
}

/// Health records of every probed participant, keyed by actor id then by
/// multi-address
#[get("/")]
pub async fn node_info_route(health: web::Data<HealthTable>) -> Result<HttpResponse, AppError> {
    let body = health.to_json().await?;
    Ok(HttpResponse::Ok().content_type("application/json").body(body))
}

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/health")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}
