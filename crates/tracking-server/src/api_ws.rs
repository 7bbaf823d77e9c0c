//! WebSocket endpoint: upgrades the request and hands the socket to a
//! [`ConnectionActor`](tracking_core::connection::ConnectionActor).

use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{future, SinkExt, StreamExt};
use std::sync::Arc;
use tracking_core::connection::{ConnectionActor, Frame};

use crate::middleware::AuthenticatedUser;
use crate::AppState;

/// Hard ceiling enforced by the WebSocket codec itself.
///
/// Frames above `max_frame_bytes` but below this limit reach the connection
/// actor, which skips them without closing the socket.
const MAX_TRANSPORT_MESSAGE_BYTES: usize = 64 * 1024;

/// Handler for `GET /api/v1/tracking/ws`.
///
/// Runs behind the auth middleware, so an unauthenticated client never gets
/// a connection actor.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    tracing::debug!(user_id = %user.0, "websocket upgrade requested");
    ws.max_message_size(MAX_TRANSPORT_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state, user.0))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let actor = ConnectionActor::new(state.hub.clone(), user_id, state.connection.clone());
    let connection_id = actor.id();

    let (sink, stream) = socket.split();
    let stream = stream.filter_map(|message| {
        future::ready(match message {
            Ok(message) => into_frame(message).map(Ok),
            Err(e) => Some(Err(e)),
        })
    });
    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(into_message(frame))));

    if let Err(e) = actor.run(stream, sink).await {
        tracing::warn!(%connection_id, error = %e, "websocket session refused");
    }
}

/// Binary frames carry nothing in this protocol and are dropped.
fn into_frame(message: AxumMessage) -> Option<Frame> {
    match message {
        AxumMessage::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
        AxumMessage::Ping(data) => Some(Frame::Ping(data.to_vec())),
        AxumMessage::Pong(data) => Some(Frame::Pong(data.to_vec())),
        AxumMessage::Close(_) => Some(Frame::Close),
        AxumMessage::Binary(_) => None,
    }
}

fn into_message(frame: Frame) -> AxumMessage {
    match frame {
        Frame::Text(text) => AxumMessage::Text(text.into()),
        Frame::Ping(data) => AxumMessage::Ping(data.into()),
        Frame::Pong(data) => AxumMessage::Pong(data.into()),
        Frame::Close => AxumMessage::Close(None),
    }
}
