//! Conversions between axum websocket messages and relay frames

use std::borrow::Cow;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::stream::SplitStream;
use futures::{StreamExt, future};
use runner_core::{Frame, FrameStream, RelayError, RunnerError};

/// Wrap the receiving half of a client socket as a frame stream
///
/// The stream ends at the client's close frame; pings and pongs are dropped.
pub(crate) fn inbound(receiver: SplitStream<WebSocket>) -> FrameStream {
    let frames = receiver
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text))),
                Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes))),
                Ok(_) => None,
                Err(e) => Some(Err(RelayError::Read(e.to_string()))),
            })
        });
    Box::pin(frames)
}

/// Convert a relay frame into a client message
pub fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Binary(bytes) => Message::Binary(bytes),
    }
}

/// Close code sent to a client whose stream could not be relayed
pub fn close_code_for(error: &RunnerError) -> u16 {
    match error {
        RunnerError::Relay(RelayError::InvalidOpen(_) | RelayError::ClosedBeforeOpen) => {
            close_code::PROTOCOL
        }
        e if e.is_not_found() => close_code::POLICY,
        _ => close_code::ERROR,
    }
}

/// Longest reason a close frame may carry, in bytes
const MAX_CLOSE_REASON: usize = 123;

/// Close frame for a rejected stream
///
/// Error messages can echo a client-supplied session id, so the reason is
/// cut to the protocol limit on a char boundary.
pub fn close_frame_for(error: &RunnerError) -> CloseFrame<'static> {
    let mut reason = error.to_string();
    if reason.len() > MAX_CLOSE_REASON {
        let mut end = MAX_CLOSE_REASON;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    CloseFrame {
        code: close_code_for(error),
        reason: Cow::Owned(reason),
    }
}
