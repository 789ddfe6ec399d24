//! # Pipeline Link
//!
//! One outbound streaming connection to the upstream speech pipeline, plus
//! the frame abstraction the relay uses for both of its peers.
//!
//! ## Pieces:
//! - [`Frame`]: a transport-neutral text/binary/close frame
//! - [`FrameChannel`]: anything that can send and receive frames (the
//!   pipeline link, or the browser's WebSocket bridged into the relay)
//! - [`LinkFactory`]: opens a fresh channel to a URL; no retries
//! - [`link::PipelineLink`]: the tokio-tungstenite implementation
//! - [`protocol`]: the JSON envelopes exchanged with the pipeline
//!
//! ## Concurrency:
//! Writers are serialized inside the link. A read may be in flight while a
//! write happens, which is what lets the relay run one loop per direction.

pub mod link;
pub mod protocol;

pub use link::WsLinkFactory;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Close codes that mean "the peer hung up on purpose".
pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

/// A single message on either side of the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// The peer closed; `None` when the transport ended without a close frame
    Close(Option<CloseReason>),
}

impl Frame {
    /// Normal closure, going away, or a bare end of stream.
    pub fn is_expected_close(&self) -> bool {
        match self {
            Frame::Close(None) => true,
            Frame::Close(Some(reason)) => reason.code == CLOSE_NORMAL || reason.code == CLOSE_GOING_AWAY,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to connect to pipeline at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("link is not open")]
    NotOpen,

    #[error("write failed: {0}")]
    Write(#[source] BoxError),

    #[error("read failed: {0}")]
    Read(#[source] BoxError),
}

/// A bidirectional frame stream.
///
/// `send` may be called from several tasks; implementations serialize the
/// writes. `close` is idempotent and never fails.
#[async_trait]
pub trait FrameChannel: Send + Sync {
    async fn send(&self, frame: Frame) -> Result<(), LinkError>;

    /// Wait for the next frame. After the peer has closed this keeps
    /// returning `Frame::Close`.
    async fn receive(&self) -> Result<Frame, LinkError>;

    async fn close(&self);

    async fn send_text(&self, payload: String) -> Result<(), LinkError> {
        self.send(Frame::Text(payload)).await
    }

    async fn send_binary(&self, payload: Vec<u8>) -> Result<(), LinkError> {
        self.send(Frame::Binary(payload)).await
    }
}

/// Opens pipeline connections.
#[async_trait]
pub trait LinkFactory: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn FrameChannel>, LinkError>;
}
