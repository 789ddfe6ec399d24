//! HTTP route table and the per-service `web::Data` wiring.
//!
//! Every handler extracts only the service it needs. [`Services`] builds those
//! services once from the startup collaborators and registers each one as its
//! own app data, so no handler ever sees the store or cache directly.

pub mod post_lesson;
pub mod sessions;
pub mod translate;
pub mod voices;

use crate::cache::{CacheStore, CacheTtls};
use crate::error::AppError;
use crate::health;
use crate::llm::LessonGenerator;
use crate::pipeline::LinkFactory;
use crate::push::PushTranslator;
use crate::relay::RelayFactory;
use crate::services::{PostLessonService, SessionService};
use crate::store::SessionStore;
use crate::websocket;
use actix_web::web;
use std::sync::Arc;

#[derive(Clone)]
pub struct Services {
    pub sessions: web::Data<SessionService>,
    pub post_lesson: web::Data<PostLessonService>,
    pub push: web::Data<PushTranslator>,
    pub relays: web::Data<RelayFactory>,
}

impl Services {
    pub fn build(
        store: Arc<dyn SessionStore>,
        cache: Arc<dyn CacheStore>,
        links: Arc<dyn LinkFactory>,
        generator: Arc<dyn LessonGenerator>,
        ttls: CacheTtls,
        pipeline_url: &str,
    ) -> Self {
        Self {
            sessions: web::Data::new(SessionService::new(Arc::clone(&store), Arc::clone(&cache), ttls)),
            post_lesson: web::Data::new(PostLessonService::new(Arc::clone(&store), cache, generator, ttls)),
            push: web::Data::new(PushTranslator::new(Arc::clone(&links), Arc::clone(&store), pipeline_url)),
            relays: web::Data::new(RelayFactory::new(links, store, pipeline_url)),
        }
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.sessions.clone())
            .app_data(self.post_lesson.clone())
            .app_data(self.push.clone())
            .app_data(self.relays.clone());
    }
}

/// Malformed JSON bodies get the same error envelope as every other failure.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| AppError::BadRequest(err.to_string()).into())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(health::health_check))
        .route("/ws/translate", web::get().to(websocket::translate_socket))
        .service(
            web::scope("/api/v1")
                .route("/health", web::get().to(health::health_check))
                .route("/metrics", web::get().to(health::detailed_metrics))
                .route("/sessions", web::post().to(sessions::create_session))
                .route("/sessions", web::get().to(sessions::list_sessions))
                .route("/sessions/{id}", web::get().to(sessions::get_session))
                .route("/sessions/{id}", web::put().to(sessions::update_session))
                .route("/sessions/{id}/segments", web::get().to(sessions::get_segments))
                .route("/sessions/{id}/summary", web::post().to(post_lesson::generate_summary))
                .route("/sessions/{id}/summary", web::get().to(post_lesson::get_summary))
                .route("/sessions/{id}/vocab", web::post().to(post_lesson::generate_vocabulary))
                .route("/sessions/{id}/vocab", web::get().to(post_lesson::get_vocabulary))
                .route("/sessions/{id}/flashcards", web::post().to(post_lesson::generate_flashcards))
                .route("/sessions/{id}/flashcards", web::get().to(post_lesson::get_flashcards))
                .route("/translate/push", web::post().to(translate::push_translate))
                .route("/voices", web::get().to(voices::list_voices)),
        );
}
