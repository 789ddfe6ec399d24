//! Post-lesson artifact endpoints.
//!
//! `POST` always goes through generation (unless the artifact is already
//! cached); `GET` serves what is stored. Vocabulary and flashcards are
//! generated on first read when the lesson has a transcript.

use crate::error::AppResult;
use crate::services::PostLessonService;
use actix_web::{web, HttpResponse};

pub async fn generate_summary(service: web::Data<PostLessonService>, path: web::Path<String>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.generate_summary(&path).await?))
}

pub async fn get_summary(service: web::Data<PostLessonService>, path: web::Path<String>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.get_summary(&path).await?))
}

pub async fn generate_vocabulary(
    service: web::Data<PostLessonService>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.generate_vocabulary(&path).await?))
}

pub async fn get_vocabulary(service: web::Data<PostLessonService>, path: web::Path<String>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.get_vocabulary(&path).await?))
}

pub async fn generate_flashcards(
    service: web::Data<PostLessonService>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.generate_flashcards(&path).await?))
}

pub async fn get_flashcards(service: web::Data<PostLessonService>, path: web::Path<String>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.get_flashcards(&path).await?))
}

#[cfg(test)]
mod tests {
    use crate::handlers::routes;
    use crate::model::{Segment, SessionConfig};
    use crate::store::SessionStore;
    use crate::testing::{FakeGenerator, TestServices};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_summary_round_trip() {
        let services = TestServices::new();
        let id = services.store.insert(SessionConfig::default()).await.unwrap().id;
        services.store.append_segment(id, Segment::new(0, "สวัสดี", "hello")).await.unwrap();
        let app = test::init_service(App::new().configure(|cfg| services.register(cfg)).configure(routes)).await;
        let uri = format!("/api/v1/sessions/{}/summary", id);

        let missing = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let generated: Value = test::call_and_read_body_json(&app, test::TestRequest::post().uri(&uri).to_request()).await;
        assert_eq!(generated["en"], "1 segments");

        let stored: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(stored, generated);
        assert_eq!(services.generator.calls(), 1);
    }

    #[actix_web::test]
    async fn test_generation_needs_segments() {
        let services = TestServices::new();
        let id = services.store.insert(SessionConfig::default()).await.unwrap().id;
        let app = test::init_service(App::new().configure(|cfg| services.register(cfg)).configure(routes)).await;

        let response = test::call_service(
            &app,
            test::TestRequest::post().uri(&format!("/api/v1/sessions/{}/flashcards", id)).to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let vocab: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri(&format!("/api/v1/sessions/{}/vocab", id)).to_request(),
        )
        .await;
        assert_eq!(vocab, serde_json::json!([]));
    }

    #[actix_web::test]
    async fn test_llm_failure_is_bad_gateway() {
        let services = TestServices::with_generator(FakeGenerator::failing());
        let id = services.store.insert(SessionConfig::default()).await.unwrap().id;
        services.store.append_segment(id, Segment::new(0, "a", "b")).await.unwrap();
        let app = test::init_service(App::new().configure(|cfg| services.register(cfg)).configure(routes)).await;

        let response = test::call_service(
            &app,
            test::TestRequest::get().uri(&format!("/api/v1/sessions/{}/flashcards", id)).to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
