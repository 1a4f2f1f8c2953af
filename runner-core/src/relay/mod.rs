//! Duplex relay between client streams and worker websockets

mod dialer;
mod pump;
mod stream;

use std::pin::Pin;

use futures::{Sink, Stream};
use tokio_tungstenite::tungstenite::Message;

use crate::error::RelayError;

pub use dialer::{WebSocketDialer, WorkerConnection, WorkerDialer};
pub use pump::{PumpOutcome, PumpReport};
pub use stream::{RelayStats, StreamRelay};

/// An opaque payload carried by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert a worker websocket message
    ///
    /// Control messages carry no payload and yield `None`.
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
            Message::Binary(bytes) => Some(Frame::Binary(bytes.to_vec())),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
        }
    }
}

/// Boxed sending half of a frame transport
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = RelayError> + Send>>;

/// Boxed receiving half of a frame transport
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, RelayError>> + Send>>;
