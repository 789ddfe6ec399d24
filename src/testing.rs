//! In-memory fakes shared by the unit tests.

use crate::cache::{CacheError, CacheStore, CacheTtls, MemoryCache};
use crate::config::AppConfig;
use crate::handlers::Services;
use crate::llm::{GenerationError, Lesson, LessonGenerator};
use crate::model::{Flashcard, Segment, Session, SessionConfig, SessionId, SessionStatus, Summary, VocabItem};
use crate::pipeline::{CloseReason, Frame, FrameChannel, LinkError, LinkFactory, CLOSE_NORMAL};
use crate::state::AppState;
use crate::store::{SessionStore, StoreError};
use actix_web::web;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// One end of an in-memory socket.
///
/// Closing it sends a normal close frame to the peer and wakes its own
/// pending `receive`, the way a real socket reports its own shutdown.
pub struct FakeChannel {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    loopback: mpsc::UnboundedSender<Frame>,
    outbound: mpsc::UnboundedSender<Frame>,
    closed: AtomicBool,
}

impl FakeChannel {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameChannel for FakeChannel {
    async fn send(&self, frame: Frame) -> Result<(), LinkError> {
        if self.is_closed() {
            return Err(LinkError::NotOpen);
        }
        self.outbound.send(frame).map_err(|e| LinkError::Write(e.to_string().into()))
    }

    async fn receive(&self) -> Result<Frame, LinkError> {
        Ok(self.inbound.lock().await.recv().await.unwrap_or(Frame::Close(None)))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.outbound.send(Frame::Close(Some(CloseReason {
            code: CLOSE_NORMAL,
            reason: String::new(),
        })));
        let _ = self.loopback.send(Frame::Close(None));
    }
}

/// The test's side of a [`FakeChannel`].
pub struct FakePeer {
    tx: mpsc::UnboundedSender<Frame>,
    rx: mpsc::UnboundedReceiver<Frame>,
    pub channel: Arc<FakeChannel>,
}

impl FakePeer {
    pub fn send(&self, frame: Frame) {
        let _ = self.tx.send(frame);
    }

    /// Next frame the channel sent, or `None` once it is dropped. Gives up
    /// after a second so a broken test fails instead of hanging.
    pub async fn recv(&mut self) -> Option<Frame> {
        tokio::time::timeout(Duration::from_secs(1), self.rx.recv()).await.ok().flatten()
    }
}

pub fn channel_pair() -> (Arc<FakeChannel>, FakePeer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let channel = Arc::new(FakeChannel {
        inbound: tokio::sync::Mutex::new(in_rx),
        loopback: in_tx.clone(),
        outbound: out_tx,
        closed: AtomicBool::new(false),
    });
    let peer = FakePeer { tx: in_tx, rx: out_rx, channel: Arc::clone(&channel) };
    (channel, peer)
}

/// Hands every dialed link's far end to the test.
pub struct FakeLinkFactory {
    dialed: Option<mpsc::UnboundedSender<FakePeer>>,
}

impl FakeLinkFactory {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FakePeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { dialed: Some(tx) }, rx)
    }

    /// A pipeline that is never reachable.
    pub fn refusing() -> Self {
        Self { dialed: None }
    }
}

#[async_trait]
impl LinkFactory for FakeLinkFactory {
    async fn connect(&self, url: &str) -> Result<Arc<dyn FrameChannel>, LinkError> {
        let Some(dialed) = &self.dialed else {
            return Err(LinkError::Connect {
                url: url.to_string(),
                source: "connection refused".into(),
            });
        };
        let (channel, peer) = channel_pair();
        let _ = dialed.send(peer);
        Ok(channel)
    }
}

/// Session store that also records every successful segment append.
#[derive(Default)]
pub struct MemoryStore {
    /// Insertion order, oldest first
    sessions: Mutex<Vec<Session>>,
    appends: Mutex<Vec<(SessionId, Segment)>>,
    find_all_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn appends(&self) -> Vec<(SessionId, Segment)> {
        self.appends.lock().unwrap().clone()
    }

    pub fn find_all_calls(&self) -> usize {
        self.find_all_calls.load(Ordering::SeqCst)
    }

    fn modify(&self, id: SessionId, change: impl FnOnce(&mut Session)) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.iter_mut().find(|s| s.id == id).ok_or(StoreError::NotFound(id))?;
        change(session);
        session.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, config: SessionConfig) -> Result<Session, StoreError> {
        let now = Utc::now();
        let session = Session {
            id: SessionId::new(),
            config,
            status: SessionStatus::Active,
            segments: Vec::new(),
            summary: None,
            vocabulary: Vec::new(),
            flashcards: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn find_one(&self, id: SessionId) -> Result<Session, StoreError> {
        let sessions = self.sessions.lock().unwrap();
        sessions.iter().find(|s| s.id == id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn find_all(&self) -> Result<Vec<Session>, StoreError> {
        self.find_all_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.sessions.lock().unwrap().iter().rev().cloned().collect())
    }

    async fn update(&self, id: SessionId, config: SessionConfig, status: SessionStatus) -> Result<Session, StoreError> {
        self.modify(id, |session| {
            session.config = config;
            session.status = status;
        })?;
        self.find_one(id).await
    }

    async fn append_segment(&self, id: SessionId, segment: Segment) -> Result<(), StoreError> {
        self.modify(id, |session| session.segments.push(segment.clone()))?;
        self.appends.lock().unwrap().push((id, segment));
        Ok(())
    }

    async fn set_summary(&self, id: SessionId, summary: Summary) -> Result<(), StoreError> {
        self.modify(id, |session| session.summary = Some(summary))
    }

    async fn set_vocabulary(&self, id: SessionId, vocabulary: Vec<VocabItem>) -> Result<(), StoreError> {
        self.modify(id, |session| session.vocabulary = vocabulary)
    }

    async fn set_flashcards(&self, id: SessionId, flashcards: Vec<Flashcard>) -> Result<(), StoreError> {
        self.modify(id, |session| session.flashcards = flashcards)
    }
}

/// A cache whose backend is always unreachable.
pub struct FailingCache;

#[async_trait]
impl CacheStore for FailingCache {
    async fn get_raw(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Transport("connection refused".to_string()))
    }

    async fn set_raw(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Transport("connection refused".to_string()))
    }

    async fn delete(&self, _keys: &[&str]) -> Result<(), CacheError> {
        Err(CacheError::Transport("connection refused".to_string()))
    }
}

/// Deterministic generator that counts how often it is asked.
#[derive(Default)]
pub struct FakeGenerator {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeGenerator {
    pub fn failing() -> Self {
        Self { calls: AtomicUsize::new(0), fail: true }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<(), GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(GenerationError::Status { status: 503, body: "overloaded".to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl LessonGenerator for FakeGenerator {
    async fn summary(&self, lesson: Lesson<'_>) -> Result<Summary, GenerationError> {
        self.begin()?;
        Ok(Summary {
            th: format!("{} ส่วน", lesson.segments.len()),
            en: format!("{} segments", lesson.segments.len()),
        })
    }

    async fn vocabulary(&self, lesson: Lesson<'_>) -> Result<Vec<VocabItem>, GenerationError> {
        self.begin()?;
        Ok(lesson
            .segments
            .iter()
            .map(|s| VocabItem {
                th: s.original_text.clone(),
                en: s.translated_text.clone(),
                difficulty: "beginner".to_string(),
                ..Default::default()
            })
            .collect())
    }

    async fn flashcards(&self, lesson: Lesson<'_>) -> Result<Vec<Flashcard>, GenerationError> {
        self.begin()?;
        Ok(lesson
            .segments
            .iter()
            .map(|s| Flashcard {
                front: s.translated_text.clone(),
                back: s.original_text.clone(),
                ..Default::default()
            })
            .collect())
    }
}

/// Every HTTP-facing service wired over in-memory fakes.
pub struct TestServices {
    pub store: Arc<MemoryStore>,
    pub generator: Arc<FakeGenerator>,
    pub state: AppState,
    services: Services,
    dialed: Option<mpsc::UnboundedReceiver<FakePeer>>,
}

impl TestServices {
    pub fn new() -> Self {
        Self::build(AppConfig::default(), FakeGenerator::default(), true)
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(config, FakeGenerator::default(), true)
    }

    pub fn with_generator(generator: FakeGenerator) -> Self {
        Self::build(AppConfig::default(), generator, true)
    }

    /// The pipeline refuses every connection.
    pub fn refusing() -> Self {
        Self::build(AppConfig::default(), FakeGenerator::default(), false)
    }

    fn build(config: AppConfig, generator: FakeGenerator, reachable: bool) -> Self {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::new(1_000, Duration::from_secs(86_400)));
        let generator = Arc::new(generator);
        let (links, dialed) = if reachable {
            let (links, dialed) = FakeLinkFactory::new();
            (links, Some(dialed))
        } else {
            (FakeLinkFactory::refusing(), None)
        };
        let services = Services::build(
            store.clone(),
            cache,
            Arc::new(links),
            generator.clone(),
            CacheTtls::default(),
            &config.pipeline.ws_url,
        );
        Self {
            store,
            generator,
            state: AppState::new(config),
            services,
            dialed,
        }
    }

    /// Far ends of the pipeline links the services dial. Only available once.
    pub fn take_dialed(&mut self) -> mpsc::UnboundedReceiver<FakePeer> {
        self.dialed.take().expect("pipeline is refusing or already taken")
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.state.clone()));
        self.services.register(cfg);
    }
}
