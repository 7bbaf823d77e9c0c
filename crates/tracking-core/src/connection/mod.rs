//! # Connection Actor
//!
//! Bridges one duplex connection to the [`Hub`](crate::hub::Hub). The actor is
//! transport-agnostic: it reads [`Frame`]s from any `Stream` and writes them to
//! any `Sink`, so the server adapts its WebSocket type and tests plug in
//! in-memory channels.
//!
//! Two loops run concurrently and stop together:
//!
//! - **reader**: parses `SUBSCRIBE`/`UNSUBSCRIBE` frames and forwards them to
//!   the hub. Malformed or oversized frames are skipped. A close frame, a read
//!   error or silence past the read deadline ends the connection.
//! - **writer**: drains the outbound queue, pings on every heartbeat tick and
//!   gives up on a write error, a write past the deadline or a closed queue.
//!
//! Whichever loop stops first cancels the other. The connection is then
//! unregistered from the hub.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::HubError;
use crate::hub::{ConnectionHandle, ConnectionId, HubClient};
use crate::model::{ClientMessage, ServerMessage};

/// Transport-level unit exchanged with the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

pub struct ConnectionActor {
    handle: Arc<ConnectionHandle>,
    hub: HubClient,
    config: ConnectionConfig,
}

impl ConnectionActor {
    pub fn new(hub: HubClient, user_id: impl Into<String>, config: ConnectionConfig) -> Self {
        Self {
            handle: ConnectionHandle::new(user_id),
            hub,
            config,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn handle(&self) -> Arc<ConnectionHandle> {
        self.handle.clone()
    }

    /// Registers with the hub and runs both loops until the connection ends.
    ///
    /// Fails only if the hub is gone before registration; the sink is closed
    /// in that case.
    pub async fn run<S, K, E>(self, stream: S, sink: K) -> Result<(), HubError>
    where
        S: Stream<Item = Result<Frame, E>>,
        E: Display,
        K: Sink<Frame>,
        K::Error: Display,
    {
        let id = self.handle.id();
        let user_id = self.handle.user_id().to_string();
        let (outbound, queue) = mpsc::channel(self.config.outbound_capacity);

        if let Err(e) = self.hub.register(self.handle.clone(), outbound).await {
            warn!(connection_id = %id, %user_id, error = %e, "Hub unavailable, refusing connection");
            let mut sink = pin!(sink);
            let _ = timeout(self.config.write_timeout(), sink.close()).await;
            return Err(e);
        }
        info!(connection_id = %id, %user_id, "Connection opened");

        let reader = async {
            self.read_loop(stream).await;
            self.handle.cancel();
        };
        let writer = async {
            self.write_loop(sink, queue).await;
            self.handle.cancel();
        };
        tokio::join!(reader, writer);

        if let Err(e) = self.hub.unregister(id).await {
            debug!(connection_id = %id, error = %e, "Hub already gone at teardown");
        }
        info!(connection_id = %id, %user_id, "Connection closed");
        Ok(())
    }

    async fn read_loop<S, E>(&self, stream: S)
    where
        S: Stream<Item = Result<Frame, E>>,
        E: Display,
    {
        let id = self.handle.id();
        let mut stream = pin!(stream);

        loop {
            let next = tokio::select! {
                _ = self.handle.cancelled() => break,
                next = timeout(self.config.read_timeout(), stream.next()) => next,
            };

            let frame = match next {
                Err(_) => {
                    warn!(connection_id = %id, "Read deadline expired");
                    break;
                }
                Ok(None) => {
                    debug!(connection_id = %id, "Stream ended");
                    break;
                }
                Ok(Some(Err(e))) => {
                    debug!(connection_id = %id, error = %e, "Read failed");
                    break;
                }
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Frame::Text(text) => {
                    if let Err(e) = self.handle_text(&text).await {
                        warn!(connection_id = %id, error = %e, "Hub unavailable");
                        break;
                    }
                }
                Frame::Ping(_) | Frame::Pong(_) => trace!(connection_id = %id, "Keepalive"),
                Frame::Close => {
                    debug!(connection_id = %id, "Peer closed");
                    break;
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) -> Result<(), HubError> {
        let id = self.handle.id();

        if text.len() > self.config.max_frame_bytes {
            warn!(connection_id = %id, size = text.len(), "Oversized frame skipped");
            return Ok(());
        }

        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(connection_id = %id, error = %e, "Malformed frame skipped");
                return Ok(());
            }
        };

        match message {
            ClientMessage::Subscribe(order_id) => {
                if self.handle.is_subscribed(&order_id) {
                    debug!(connection_id = %id, %order_id, "Duplicate subscribe skipped");
                } else {
                    self.hub.subscribe(id, order_id).await?;
                }
            }
            ClientMessage::Unsubscribe(order_id) => {
                self.hub.unsubscribe(id, order_id).await?;
            }
            ClientMessage::Unknown => {
                debug!(connection_id = %id, "Unsupported message skipped");
            }
        }
        Ok(())
    }

    async fn write_loop<K>(&self, sink: K, mut queue: mpsc::Receiver<Arc<ServerMessage>>)
    where
        K: Sink<Frame>,
        K::Error: Display,
    {
        let id = self.handle.id();
        let write_timeout = self.config.write_timeout();
        let period = self.config.heartbeat_interval();
        let mut sink = pin!(sink);
        let mut cancelled = pin!(self.handle.cancelled());
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let frame = tokio::select! {
                _ = &mut cancelled => break,
                message = queue.recv() => match message {
                    Some(message) => Frame::Text(message.encoded().to_string()),
                    None => {
                        debug!(connection_id = %id, "Outbound queue closed by hub");
                        break;
                    }
                },
                _ = heartbeat.tick() => Frame::Ping(Vec::new()),
            };

            match timeout(write_timeout, sink.send(frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(connection_id = %id, error = %e, "Write failed");
                    break;
                }
                Err(_) => {
                    warn!(connection_id = %id, "Write deadline expired");
                    break;
                }
            }
        }

        let _ = timeout(write_timeout, sink.send(Frame::Close)).await;
        let _ = timeout(write_timeout, sink.close()).await;
    }
}
