//! # Session Relay
//!
//! Bidirectional proxy between one client connection and one pipeline link.
//! Frames are forwarded unmodified in both directions; `transcript` events
//! coming back from the pipeline are also appended to the session the client
//! last announced.
//!
//! ## Lifecycle:
//! ```text
//! Connecting ──► Relaying ──► Closing ──► Closed
//!      └────────── (connect failed) ───────┘
//! ```
//! - **Connecting**: dial the pipeline. On failure the client gets one
//!   `{"type":"error"}` frame and is closed.
//! - **Relaying**: one task per direction.
//! - **Closing**: the first loop to finish closes the opposite peer so the
//!   other loop unblocks; the relay waits for both.
//! - **Closed**: both peers closed (closing twice is harmless).
//!
//! ## Session binding:
//! The client may announce or change its session at any point by sending a
//! text frame with a `session_id`. The client loop is the only writer of the
//! binding; the pipeline loop reads the latest value once per inbound frame.
//! The binding is eventually consistent: a transcript racing an announcement
//! may still see the previous value, and one that arrives before any
//! announcement is forwarded but not stored.

use crate::effect::non_critical;
use crate::model::{Segment, SessionId};
use crate::pipeline::protocol::{self, Envelope};
use crate::pipeline::{Frame, FrameChannel, LinkFactory};
use crate::store::SessionStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Message sent to the client when the pipeline cannot be reached.
pub const CONNECT_FAILED_MESSAGE: &str = "Failed to connect to pipeline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Connecting,
    Relaying,
    Closing,
    Closed,
}

/// Builds a fresh [`SessionRelay`] for every accepted client connection.
#[derive(Clone)]
pub struct RelayFactory {
    links: Arc<dyn LinkFactory>,
    store: Arc<dyn SessionStore>,
    pipeline_url: String,
}

impl RelayFactory {
    pub fn new(links: Arc<dyn LinkFactory>, store: Arc<dyn SessionStore>, pipeline_url: impl Into<String>) -> Self {
        Self {
            links,
            store,
            pipeline_url: pipeline_url.into(),
        }
    }

    pub fn relay(&self) -> SessionRelay {
        SessionRelay::new(Arc::clone(&self.links), Arc::clone(&self.store), self.pipeline_url.clone())
    }
}

/// One relay per client connection. Not reusable.
pub struct SessionRelay {
    links: Arc<dyn LinkFactory>,
    store: Arc<dyn SessionStore>,
    pipeline_url: String,
    state: Arc<watch::Sender<RelayState>>,
}

impl SessionRelay {
    pub fn new(links: Arc<dyn LinkFactory>, store: Arc<dyn SessionStore>, pipeline_url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(RelayState::Connecting);
        Self {
            links,
            store,
            pipeline_url: pipeline_url.into(),
            state: Arc::new(state),
        }
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    /// Relay until both directions have stopped.
    pub async fn run(self, client: Arc<dyn FrameChannel>) {
        let pipeline = match self.links.connect(&self.pipeline_url).await {
            Ok(link) => link,
            Err(e) => {
                error!(url = %self.pipeline_url, error = %e, "Failed to connect to pipeline");
                self.state.send_replace(RelayState::Closing);
                if let Err(e) = client.send_text(protocol::error_frame(CONNECT_FAILED_MESSAGE)).await {
                    debug!(error = %e, "Connect-failure notice not delivered");
                }
                client.close().await;
                self.state.send_replace(RelayState::Closed);
                return;
            }
        };

        info!(url = %self.pipeline_url, "Relay started");
        self.state.send_replace(RelayState::Relaying);

        let (binding_tx, binding_rx) = watch::channel(None::<SessionId>);

        let upstream = tokio::spawn(pump_upstream(
            Arc::clone(&pipeline),
            Arc::clone(&client),
            binding_rx,
            Arc::clone(&self.store),
            Arc::clone(&self.state),
        ));
        let downstream = tokio::spawn(pump_downstream(
            Arc::clone(&client),
            Arc::clone(&pipeline),
            binding_tx,
            Arc::clone(&self.state),
        ));

        let (up, down) = tokio::join!(upstream, downstream);
        for result in [up, down] {
            if let Err(e) = result {
                error!(error = %e, "Relay loop panicked");
            }
        }

        pipeline.close().await;
        client.close().await;
        self.state.send_replace(RelayState::Closed);
        info!(url = %self.pipeline_url, "Relay closed");
    }
}

/// Pipeline → client. Captures transcripts for the bound session.
async fn pump_upstream(
    pipeline: Arc<dyn FrameChannel>,
    client: Arc<dyn FrameChannel>,
    binding: watch::Receiver<Option<SessionId>>,
    store: Arc<dyn SessionStore>,
    state: Arc<watch::Sender<RelayState>>,
) {
    loop {
        let frame = match pipeline.receive().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Pipeline read ended");
                break;
            }
        };
        if let Frame::Close(_) = frame {
            if !frame.is_expected_close() {
                warn!(frame = ?frame, "Pipeline closed unexpectedly");
            }
            break;
        }

        if let Frame::Text(text) = &frame {
            let session = *binding.borrow();
            capture_transcript(store.as_ref(), session, text).await;
        }

        if let Err(e) = client.send(frame).await {
            warn!(error = %e, "Client write failed");
            break;
        }
    }

    state.send_replace(RelayState::Closing);
    client.close().await;
}

/// Client → pipeline. Tracks the client's session announcements.
async fn pump_downstream(
    client: Arc<dyn FrameChannel>,
    pipeline: Arc<dyn FrameChannel>,
    binding: watch::Sender<Option<SessionId>>,
    state: Arc<watch::Sender<RelayState>>,
) {
    loop {
        let frame = match client.receive().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Client read ended");
                break;
            }
        };
        if let Frame::Close(_) = frame {
            if !frame.is_expected_close() {
                warn!(frame = ?frame, "Client closed unexpectedly");
            }
            break;
        }

        if let Frame::Text(text) = &frame {
            if let Some(id) = Envelope::parse(text).and_then(|envelope| envelope.session_id()) {
                if binding.send_replace(Some(id)) != Some(id) {
                    debug!(session_id = %id, "Relay bound to session");
                }
            }
        }

        if let Err(e) = pipeline.send(frame).await {
            warn!(error = %e, "Pipeline write failed");
            break;
        }
    }

    state.send_replace(RelayState::Closing);
    pipeline.close().await;
}

/// Append a segment when `text` is a transcript event and a session is bound.
async fn capture_transcript(store: &dyn SessionStore, session: Option<SessionId>, text: &str) {
    let Some(envelope) = Envelope::parse(text) else {
        return;
    };
    if !envelope.is_transcript() {
        return;
    }
    let Some(session_id) = session else {
        debug!("Transcript before any session announcement, not stored");
        return;
    };

    let data = match envelope.transcript() {
        Ok(data) => data,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Malformed transcript payload");
            return;
        }
    };

    let segment = Segment::new(data.index, data.original_text, data.translated_text);
    non_critical("append transcript segment", store.append_segment(session_id, segment).await);
}
