//! WebSocket implementation of the pipeline link.

use super::{CloseReason, Frame, FrameChannel, LinkError, LinkFactory};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exactly one upstream connection, closed at most once.
///
/// The socket is split so a reader parked in `receive` never blocks a
/// writer; each half has its own lock. Closing wakes a parked reader even if
/// the pipeline never answers the close handshake.
pub struct PipelineLink {
    url: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: watch::Sender<bool>,
}

impl PipelineLink {
    /// Dial the pipeline. No retry; the caller decides what a failure means.
    pub async fn connect(url: &str) -> Result<Self, LinkError> {
        let (socket, _response) = connect_async(url).await.map_err(|e| LinkError::Connect {
            url: url.to_string(),
            source: Box::new(e),
        })?;
        debug!(url = url, "Pipeline link open");

        let (sink, stream) = socket.split();
        Ok(Self {
            url: url.to_string(),
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: watch::channel(false).0,
        })
    }
}

#[async_trait]
impl FrameChannel for PipelineLink {
    async fn send(&self, frame: Frame) -> Result<(), LinkError> {
        if *self.closed.borrow() {
            return Err(LinkError::NotOpen);
        }

        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
            Frame::Close(reason) => Message::Close(reason.map(|r| CloseFrame {
                code: CloseCode::from(r.code),
                reason: r.reason.into(),
            })),
        };

        let mut sink = self.sink.lock().await;
        sink.send(message).await.map_err(|e| LinkError::Write(Box::new(e)))
    }

    async fn receive(&self) -> Result<Frame, LinkError> {
        let mut closed = self.closed.subscribe();
        let mut stream = self.stream.lock().await;
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = closed.wait_for(|closed| *closed) => return Ok(Frame::Close(None)),
            };
            match next {
                Some(Ok(Message::Text(text))) => return Ok(Frame::Text(text)),
                Some(Ok(Message::Binary(bytes))) => return Ok(Frame::Binary(bytes)),
                Some(Ok(Message::Close(frame))) => {
                    return Ok(Frame::Close(frame.map(|f| CloseReason {
                        code: u16::from(f.code),
                        reason: f.reason.into_owned(),
                    })))
                }
                // tungstenite answers pings on its own
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => return Ok(Frame::Close(None)),
                Some(Err(e)) => return Err(LinkError::Read(Box::new(e))),
            }
        }
    }

    async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }

        let mut sink = self.sink.lock().await;
        let goodbye = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if let Err(e) = sink.send(Message::Close(Some(goodbye))).await {
            debug!(url = %self.url, error = %e, "Close frame not delivered");
        }
        if let Err(e) = sink.close().await {
            debug!(url = %self.url, error = %e, "Pipeline socket already gone");
        }
        debug!(url = %self.url, "Pipeline link closed");
    }
}

/// Opens a new [`PipelineLink`] per call.
#[derive(Debug, Default, Clone)]
pub struct WsLinkFactory;

#[async_trait]
impl LinkFactory for WsLinkFactory {
    async fn connect(&self, url: &str) -> Result<Arc<dyn FrameChannel>, LinkError> {
        let link = PipelineLink::connect(url).await?;
        Ok(Arc::new(link))
    }
}
