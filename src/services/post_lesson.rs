//! Post-lesson artifacts: summary, vocabulary and flashcards.
//!
//! Generation is expensive, so every artifact is cached under its own key
//! with the longest TTL tier and a cache hit never reaches the LLM. A
//! generated artifact is stored on the session before it is cached, and the
//! cached session record and session list are dropped so neither can hide
//! the new artifact.
//!
//! `get_vocabulary` and `get_flashcards` generate on demand when the session
//! has segments but nothing stored yet; `get_summary` never does.

use super::parse_session_id;
use crate::cache::{self, keys, CacheStore, CacheTtls};
use crate::error::{AppError, AppResult};
use crate::llm::{Lesson, LessonGenerator};
use crate::model::{Flashcard, Session, SessionId, Summary, VocabItem};
use crate::store::SessionStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PostLessonService {
    store: Arc<dyn SessionStore>,
    cache: Arc<dyn CacheStore>,
    generator: Arc<dyn LessonGenerator>,
    ttls: CacheTtls,
}

fn lesson(session: &Session) -> Lesson<'_> {
    Lesson {
        segments: &session.segments,
        source_lang: &session.config.source_lang,
        target_lang: &session.config.target_lang,
    }
}

impl PostLessonService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        cache: Arc<dyn CacheStore>,
        generator: Arc<dyn LessonGenerator>,
        ttls: CacheTtls,
    ) -> Self {
        Self { store, cache, generator, ttls }
    }

    pub async fn generate_summary(&self, raw_id: &str) -> AppResult<Summary> {
        let id = parse_session_id(raw_id)?;
        let key = keys::summary(&id);
        if let Some(hit) = self.cached::<Summary>(&key).await {
            return Ok(hit);
        }

        let session = self.session_with_segments(id).await?;
        let summary = self.generator.summary(lesson(&session)).await?;
        self.store.set_summary(id, summary.clone()).await?;
        self.publish(id, &key, &summary, "summary").await;
        Ok(summary)
    }

    pub async fn get_summary(&self, raw_id: &str) -> AppResult<Summary> {
        let id = parse_session_id(raw_id)?;
        let key = keys::summary(&id);
        if let Some(hit) = self.cached::<Summary>(&key).await {
            return Ok(hit);
        }

        let summary = self
            .store
            .find_one(id)
            .await?
            .summary
            .ok_or_else(|| AppError::NotFound(format!("no summary available for session {}", id)))?;
        cache::populate(self.cache.as_ref(), &key, &summary, self.ttls.artifact).await;
        Ok(summary)
    }

    pub async fn generate_vocabulary(&self, raw_id: &str) -> AppResult<Vec<VocabItem>> {
        let id = parse_session_id(raw_id)?;
        let key = keys::vocabulary(&id);
        if let Some(hit) = self.cached::<Vec<VocabItem>>(&key).await {
            return Ok(hit);
        }

        let session = self.session_with_segments(id).await?;
        self.create_vocabulary(&session, &key).await
    }

    pub async fn get_vocabulary(&self, raw_id: &str) -> AppResult<Vec<VocabItem>> {
        let id = parse_session_id(raw_id)?;
        let key = keys::vocabulary(&id);
        if let Some(hit) = self.cached::<Vec<VocabItem>>(&key).await {
            return Ok(hit);
        }

        let session = self.store.find_one(id).await?;
        if session.vocabulary.is_empty() {
            if session.segments.is_empty() {
                return Ok(Vec::new());
            }
            debug!(session_id = %id, "No stored vocabulary, generating");
            return self.create_vocabulary(&session, &key).await;
        }

        cache::populate(self.cache.as_ref(), &key, &session.vocabulary, self.ttls.artifact).await;
        Ok(session.vocabulary)
    }

    pub async fn generate_flashcards(&self, raw_id: &str) -> AppResult<Vec<Flashcard>> {
        let id = parse_session_id(raw_id)?;
        let key = keys::flashcards(&id);
        if let Some(hit) = self.cached::<Vec<Flashcard>>(&key).await {
            return Ok(hit);
        }

        let session = self.session_with_segments(id).await?;
        self.create_flashcards(&session, &key).await
    }

    pub async fn get_flashcards(&self, raw_id: &str) -> AppResult<Vec<Flashcard>> {
        let id = parse_session_id(raw_id)?;
        let key = keys::flashcards(&id);
        if let Some(hit) = self.cached::<Vec<Flashcard>>(&key).await {
            return Ok(hit);
        }

        let session = self.store.find_one(id).await?;
        if session.flashcards.is_empty() {
            if session.segments.is_empty() {
                return Ok(Vec::new());
            }
            debug!(session_id = %id, "No stored flashcards, generating");
            return self.create_flashcards(&session, &key).await;
        }

        cache::populate(self.cache.as_ref(), &key, &session.flashcards, self.ttls.artifact).await;
        Ok(session.flashcards)
    }

    async fn create_vocabulary(&self, session: &Session, key: &str) -> AppResult<Vec<VocabItem>> {
        let vocabulary = self.generator.vocabulary(lesson(session)).await?;
        self.store.set_vocabulary(session.id, vocabulary.clone()).await?;
        self.publish(session.id, key, &vocabulary, "vocabulary").await;
        Ok(vocabulary)
    }

    async fn create_flashcards(&self, session: &Session, key: &str) -> AppResult<Vec<Flashcard>> {
        let flashcards = self.generator.flashcards(lesson(session)).await?;
        self.store.set_flashcards(session.id, flashcards.clone()).await?;
        self.publish(session.id, key, &flashcards, "flashcards").await;
        Ok(flashcards)
    }

    /// Cache lookup where any failure counts as a miss.
    async fn cached<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match cache::get::<T>(self.cache.as_ref(), key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(key = key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn session_with_segments(&self, id: SessionId) -> AppResult<Session> {
        let session = self.store.find_one(id).await?;
        if session.segments.is_empty() {
            return Err(AppError::BadRequest(format!("no segments found for session {}", id)));
        }
        Ok(session)
    }

    /// Cache a freshly stored artifact and drop every cached view that embeds it.
    async fn publish<T: serde::Serialize>(&self, id: SessionId, key: &str, artifact: &T, kind: &str) {
        cache::populate(self.cache.as_ref(), key, artifact, self.ttls.artifact).await;
        let session_key = keys::session(&id);
        cache::invalidate(self.cache.as_ref(), &[session_key.as_str(), keys::SESSIONS_LIST]).await;
        info!(session_id = %id, artifact = kind, "Post-lesson artifact generated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::model::{Segment, SessionConfig};
    use crate::services::SessionService;
    use crate::testing::{FakeGenerator, MemoryStore};
    use std::time::Duration;

    struct Fixture {
        service: PostLessonService,
        store: Arc<MemoryStore>,
        cache: Arc<MemoryCache>,
        generator: Arc<FakeGenerator>,
    }

    fn fixture(generator: FakeGenerator) -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::new(100, Duration::from_secs(86_400)));
        let generator = Arc::new(generator);
        let service = PostLessonService::new(store.clone(), cache.clone(), generator.clone(), CacheTtls::default());
        Fixture { service, store, cache, generator }
    }

    async fn session_with_transcript(store: &MemoryStore) -> SessionId {
        let id = store.insert(SessionConfig::default()).await.unwrap().id;
        store.append_segment(id, Segment::new(0, "เศษส่วน", "fraction")).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_summary_generated_once_then_served_from_cache() {
        let f = fixture(FakeGenerator::default());
        let id = session_with_transcript(&f.store).await;

        let first = f.service.generate_summary(&id.to_string()).await.unwrap();
        let second = f.service.generate_summary(&id.to_string()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.generator.calls(), 1);
        assert_eq!(f.store.find_one(id).await.unwrap().summary, Some(first));
    }

    #[tokio::test]
    async fn test_generation_without_segments_is_bad_request() {
        let f = fixture(FakeGenerator::default());
        let id = f.store.insert(SessionConfig::default()).await.unwrap().id;

        let err = f.service.generate_summary(&id.to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(f.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_summary_is_not_found() {
        let f = fixture(FakeGenerator::default());
        let id = session_with_transcript(&f.store).await;

        let err = f.service.get_summary(&id.to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(f.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_vocabulary_is_generated_on_first_read() {
        let f = fixture(FakeGenerator::default());
        let id = session_with_transcript(&f.store).await;

        let vocabulary = f.service.get_vocabulary(&id.to_string()).await.unwrap();
        assert_eq!(vocabulary.len(), 1);
        assert_eq!(f.store.find_one(id).await.unwrap().vocabulary, vocabulary);

        f.service.get_vocabulary(&id.to_string()).await.unwrap();
        assert_eq!(f.generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_session_has_no_flashcards() {
        let f = fixture(FakeGenerator::default());
        let id = f.store.insert(SessionConfig::default()).await.unwrap().id;

        assert!(f.service.get_flashcards(&id.to_string()).await.unwrap().is_empty());
        assert_eq!(f.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_is_reported_and_not_cached() {
        let f = fixture(FakeGenerator::failing());
        let id = session_with_transcript(&f.store).await;

        let err = f.service.generate_flashcards(&id.to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::Generation(_)));
        assert!(f.cache.get_raw(&keys::flashcards(&id)).await.unwrap().is_none());
        assert!(f.store.find_one(id).await.unwrap().flashcards.is_empty());
    }

    #[tokio::test]
    async fn test_new_artifact_drops_cached_session() {
        let f = fixture(FakeGenerator::default());
        let id = session_with_transcript(&f.store).await;
        let session_key = keys::session(&id);
        f.cache.set_raw(&session_key, "{}".to_string(), Duration::from_secs(60)).await.unwrap();

        f.service.generate_vocabulary(&id.to_string()).await.unwrap();
        assert!(f.cache.get_raw(&session_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_artifact_refreshes_session_list() {
        let f = fixture(FakeGenerator::default());
        let id = session_with_transcript(&f.store).await;
        let sessions = SessionService::new(f.store.clone(), f.cache.clone(), CacheTtls::default());

        assert!(sessions.list().await.unwrap()[0].summary.is_none());
        let summary = f.service.generate_summary(&id.to_string()).await.unwrap();

        assert!(f.cache.get_raw(keys::SESSIONS_LIST).await.unwrap().is_none());
        assert_eq!(sessions.list().await.unwrap()[0].summary, Some(summary));
    }
}
