//! # Realtime Translation Socket
//!
//! `GET /ws/translate` upgrades to a WebSocket and bridges it into a
//! [`SessionRelay`]. The relay is transport-agnostic and speaks
//! [`FrameChannel`], so this module adapts the actix actor to that trait:
//!
//! ```text
//!  browser ──ws──► ClientSocket (actor) ──mpsc──► ActorChannel::receive ──► relay
//!  browser ◄─ws─── ClientSocket (actor) ◄─Outbound── ActorChannel::send ◄── relay
//! ```
//!
//! ## Lifecycle:
//! - The upgrade claims a relay slot first; at the configured limit the
//!   request is refused with 503 before any upgrade happens.
//! - `started` spawns the relay task. The slot is released when the relay
//!   returns, or when the actor is dropped without ever starting.
//! - `stopped` pushes a bare close into the inbound queue so the relay's
//!   client loop ends even if the browser vanished without a close frame.
//!
//! Protocol-level pings keep idle connections alive; the JSON stream itself
//! is relayed untouched.

use crate::error::AppError;
use crate::pipeline::{CloseReason, Frame, FrameChannel, LinkError, CLOSE_NORMAL};
use crate::relay::{RelayFactory, SessionRelay};
use crate::state::{AppState, RelaySlot};
use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// A frame the relay wants written to the browser.
#[derive(Message)]
#[rtype(result = "()")]
struct Outbound(Frame);

/// The relay's view of one browser connection.
struct ActorChannel {
    inbound: Mutex<mpsc::UnboundedReceiver<Frame>>,
    loopback: mpsc::UnboundedSender<Frame>,
    socket: Addr<ClientSocket>,
    closed: AtomicBool,
}

#[async_trait]
impl FrameChannel for ActorChannel {
    async fn send(&self, frame: Frame) -> Result<(), LinkError> {
        if self.closed.load(Ordering::SeqCst) || !self.socket.connected() {
            return Err(LinkError::NotOpen);
        }
        self.socket.do_send(Outbound(frame));
        Ok(())
    }

    async fn receive(&self) -> Result<Frame, LinkError> {
        Ok(self.inbound.lock().await.recv().await.unwrap_or(Frame::Close(None)))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.socket.connected() {
            self.socket.do_send(Outbound(Frame::Close(Some(CloseReason {
                code: CLOSE_NORMAL,
                reason: String::new(),
            }))));
        }
        let _ = self.loopback.send(Frame::Close(None));
    }
}

/// Pieces that move into the relay task once the actor starts.
struct PendingRelay {
    relay: SessionRelay,
    inbound: mpsc::UnboundedReceiver<Frame>,
    slot: RelaySlot,
}

pub struct ClientSocket {
    inbound: mpsc::UnboundedSender<Frame>,
    pending: Option<PendingRelay>,
    last_heartbeat: Instant,
}

impl ClientSocket {
    pub fn new(relay: SessionRelay, slot: RelaySlot) -> Self {
        let (inbound, receiver) = mpsc::unbounded_channel();
        Self {
            inbound,
            pending: Some(PendingRelay {
                relay,
                inbound: receiver,
                slot,
            }),
            last_heartbeat: Instant::now(),
        }
    }

    fn forward(&self, frame: Frame) {
        if self.inbound.send(frame).is_err() {
            debug!("Relay already finished, dropping client frame");
        }
    }
}

fn to_ws_reason(reason: CloseReason) -> ws::CloseReason {
    ws::CloseReason {
        code: ws::CloseCode::from(reason.code),
        description: (!reason.reason.is_empty()).then_some(reason.reason),
    }
}

fn from_ws_reason(reason: ws::CloseReason) -> CloseReason {
    CloseReason {
        code: u16::from(reason.code),
        reason: reason.description.unwrap_or_default(),
    }
}

impl Actor for ClientSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Translation socket opened");

        if let Some(pending) = self.pending.take() {
            let channel = Arc::new(ActorChannel {
                inbound: Mutex::new(pending.inbound),
                loopback: self.inbound.clone(),
                socket: ctx.address(),
                closed: AtomicBool::new(false),
            });
            let PendingRelay { relay, slot, .. } = pending;
            tokio::spawn(async move {
                relay.run(channel).await;
                drop(slot);
            });
        }

        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!("Translation socket heartbeat timeout, closing connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("Translation socket closed");
        self.forward(Frame::Close(None));
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ClientSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => self.forward(Frame::Text(text.to_string())),
            Ok(ws::Message::Binary(data)) => self.forward(Frame::Binary(data.to_vec())),
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                debug!(reason = ?reason, "Client sent close");
                self.forward(Frame::Close(reason.clone().map(from_ws_reason)));
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!("Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(error = %err, "Translation socket protocol error");
                ctx.stop();
            }
        }
    }
}

impl Handler<Outbound> for ClientSocket {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        match msg.0 {
            Frame::Text(text) => ctx.text(text),
            Frame::Binary(data) => ctx.binary(data),
            Frame::Close(reason) => {
                ctx.close(reason.map(to_ws_reason));
                ctx.stop();
            }
        }
    }
}

pub async fn translate_socket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    relays: web::Data<RelayFactory>,
) -> ActixResult<HttpResponse> {
    let limit = state.config().performance.max_concurrent_sessions;
    let Some(slot) = RelaySlot::acquire(&state, limit) else {
        warn!(limit = limit, "Relay limit reached, refusing connection");
        return Err(AppError::Unavailable(format!("relay limit of {} connections reached", limit)).into());
    };

    info!(peer = ?req.connection_info().peer_addr(), "New translation socket request");
    ws::start(ClientSocket::new(relays.relay(), slot), &req, stream)
}
