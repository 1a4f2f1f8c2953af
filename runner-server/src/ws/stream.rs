//! `/Services.Stream` handler

use std::borrow::Cow;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{RawQuery, State};
use axum::response::{IntoResponse, Response};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use runner_core::{FrameSink, RelayError, RunnerError, SessionRef};
use tracing::{debug, info, warn};

use crate::{AppState, ServerError};

use super::frames::{close_frame_for, inbound, to_message};

/// Frames buffered between the relay and the client socket writer
const OUTBOUND_BUFFER: usize = 32;

/// WebSocket upgrade handler
///
/// A query naming the session (`?_id=..&_sid=..`) is checked before the
/// upgrade; without one the first frame must identify the session.
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let sref = match query.as_deref().filter(|q| names_session(q)) {
        Some(q) => match SessionRef::from_query(q) {
            Ok(sref) => Some(sref),
            Err(e) => return ServerError::from(e).into_response(),
        },
        None => None,
    };

    if let Some(sref) = &sref
        && state.coordinator.table().get(&sref.session_id).await.is_none()
    {
        return ServerError::from(RunnerError::NotFound(sref.session_id.clone())).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, sref))
}

fn names_session(query: &str) -> bool {
    url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()).any(|(k, _)| k == "_sid")
}

/// Relay one client socket
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, sref: Option<SessionRef>) {
    let (mut sender, receiver) = socket.split();

    // The relay writes into a channel; this task owns the socket sender so a
    // close frame can still be sent after the relay returns.
    let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.next().await {
            if sender.send(to_message(frame)).await.is_err() {
                break;
            }
        }
        sender
    });
    let outbound: FrameSink = Box::pin(tx.sink_map_err(|e| RelayError::Write(e.to_string())));

    let result = match sref {
        Some(sref) => state.relay.serve(&sref, inbound(receiver), outbound).await,
        None => state.relay.serve_first_frame(inbound(receiver), outbound).await,
    };

    let close = match &result {
        Ok(stats) => {
            debug!(
                session_id = %stats.session_id,
                upstream_bytes = stats.client_to_worker.bytes,
                downstream_bytes = stats.worker_to_client.bytes,
                "Stream closed"
            );
            CloseFrame {
                code: close_code::NORMAL,
                reason: Cow::Borrowed("relay ended"),
            }
        }
        Err(e) => {
            info!(error = %e, "Stream rejected");
            close_frame_for(e)
        }
    };

    match writer.await {
        Ok(mut sender) => {
            let _ = sender.send(Message::Close(Some(close))).await;
        }
        Err(e) => warn!("Stream writer task failed: {}", e),
    }
}
