//! # Push-to-Talk
//!
//! One audio clip in, one translation out. Each call opens its own pipeline
//! link, runs a fixed exchange and closes the link again:
//!
//! 1. text `config` frame (session, languages, `push_to_talk` mode)
//! 2. one binary frame with the whole clip
//! 3. text `end_audio` frame
//! 4. exactly one response frame, parsed as [`PushResponse`]
//!
//! Every phase has its own [`PushError`] variant. Storing the result as a
//! segment afterwards is best-effort and never fails the call. There is no
//! timeout on the response wait.

use crate::effect::non_critical;
use crate::model::{Segment, SessionId};
use crate::pipeline::protocol::{self, PushResponse};
use crate::pipeline::{Frame, FrameChannel, LinkError, LinkFactory};
use crate::store::SessionStore;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("failed to connect to pipeline: {0}")]
    Connect(#[source] LinkError),

    #[error("failed to send config: {0}")]
    SendConfig(#[source] LinkError),

    #[error("failed to send audio: {0}")]
    SendAudio(#[source] LinkError),

    #[error("failed to send end signal: {0}")]
    SendEnd(#[source] LinkError),

    #[error("failed to read pipeline response: {0}")]
    ReadResponse(#[source] LinkError),

    #[error("pipeline closed before responding")]
    ClosedBeforeResponse,

    #[error("failed to parse pipeline response: {0}")]
    ParseResponse(#[source] serde_json::Error),
}

impl PushError {
    /// Which step of the exchange failed.
    pub fn phase(&self) -> &'static str {
        match self {
            PushError::Connect(_) => "connect",
            PushError::SendConfig(_) => "send-config",
            PushError::SendAudio(_) => "send-audio",
            PushError::SendEnd(_) => "send-end",
            PushError::ReadResponse(_) | PushError::ClosedBeforeResponse => "read-response",
            PushError::ParseResponse(_) => "parse-response",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PushRequest {
    /// Raw client value; only a well-formed ID gets the result stored
    pub session_id: String,
    pub audio: Vec<u8>,
    pub source_lang: String,
    pub target_lang: String,
}

pub struct PushTranslator {
    links: Arc<dyn LinkFactory>,
    store: Arc<dyn SessionStore>,
    pipeline_url: String,
}

impl PushTranslator {
    pub fn new(links: Arc<dyn LinkFactory>, store: Arc<dyn SessionStore>, pipeline_url: impl Into<String>) -> Self {
        Self {
            links,
            store,
            pipeline_url: pipeline_url.into(),
        }
    }

    pub async fn translate(&self, request: PushRequest) -> Result<PushResponse, PushError> {
        let link = self
            .links
            .connect(&self.pipeline_url)
            .await
            .map_err(PushError::Connect)?;

        let outcome = exchange(link.as_ref(), &request).await;
        link.close().await;
        let response = outcome?;

        info!(
            session_id = %request.session_id,
            audio_bytes = request.audio.len(),
            "Push-to-talk translated"
        );

        if let Some(session_id) = SessionId::parse(&request.session_id) {
            self.store_segment(session_id, &response).await;
        }

        Ok(response)
    }

    /// Index is the segment count at read time; a concurrent append to the
    /// same session can produce a duplicate index.
    async fn store_segment(&self, session_id: SessionId, response: &PushResponse) {
        let Some(session) = non_critical("load session for segment", self.store.find_one(session_id).await) else {
            return;
        };
        let index = i64::try_from(session.segments.len()).unwrap_or(i64::MAX);
        let segment = Segment::new(index, response.original_text.clone(), response.translated_text.clone());
        if non_critical("append push segment", self.store.append_segment(session_id, segment).await).is_some() {
            debug!(session_id = %session_id, index = index, "Push segment stored");
        }
    }
}

async fn exchange(link: &dyn FrameChannel, request: &PushRequest) -> Result<PushResponse, PushError> {
    let config = protocol::config_frame(&request.session_id, &request.source_lang, &request.target_lang);
    link.send_text(config).await.map_err(PushError::SendConfig)?;
    link.send_binary(request.audio.clone()).await.map_err(PushError::SendAudio)?;
    link.send_text(protocol::end_audio_frame()).await.map_err(PushError::SendEnd)?;

    let frame = link.receive().await.map_err(PushError::ReadResponse)?;
    let parsed = match frame {
        Frame::Text(text) => serde_json::from_str(&text),
        Frame::Binary(bytes) => serde_json::from_slice(&bytes),
        Frame::Close(_) => return Err(PushError::ClosedBeforeResponse),
    };
    parsed.map_err(PushError::ParseResponse)
}
