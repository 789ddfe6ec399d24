//! Session CRUD endpoints.
//!
//! - `POST /api/v1/sessions` - create a session from its lesson configuration
//! - `GET /api/v1/sessions` - all sessions, newest first
//! - `GET /api/v1/sessions/{id}` - one session with its segments
//! - `PUT /api/v1/sessions/{id}` - replace configuration and status
//! - `GET /api/v1/sessions/{id}/segments` - the transcript only

use crate::error::AppResult;
use crate::model::{SessionConfig, SessionUpdate};
use crate::services::SessionService;
use actix_web::{web, HttpResponse};

pub async fn create_session(
    service: web::Data<SessionService>,
    body: web::Json<SessionConfig>,
) -> AppResult<HttpResponse> {
    let session = service.create(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn list_sessions(service: web::Data<SessionService>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.list().await?))
}

pub async fn get_session(service: web::Data<SessionService>, path: web::Path<String>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.get(&path).await?))
}

pub async fn update_session(
    service: web::Data<SessionService>,
    path: web::Path<String>,
    body: web::Json<SessionUpdate>,
) -> AppResult<HttpResponse> {
    let session = service.update(&path, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn get_segments(service: web::Data<SessionService>, path: web::Path<String>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.segments(&path).await?))
}
