//! Connecting to worker websockets

use async_trait::async_trait;
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::error::RelayError;

use super::{Frame, FrameSink, FrameStream};

/// Both halves of a worker connection
pub struct WorkerConnection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens the connection to the worker listening on a session's port
#[async_trait]
pub trait WorkerDialer: Send + Sync {
    async fn dial(&self, port: u16) -> Result<WorkerConnection, RelayError>;
}

/// Dials `ws://{host}:{port}{path}`
#[derive(Debug, Clone)]
pub struct WebSocketDialer {
    host: String,
    path: String,
}

impl WebSocketDialer {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self {
            host: host.into(),
            path,
        }
    }

    /// Worker URL for a port
    pub fn endpoint(&self, port: u16) -> String {
        format!("ws://{}:{}{}", self.host, port, self.path)
    }
}

#[async_trait]
impl WorkerDialer for WebSocketDialer {
    async fn dial(&self, port: u16) -> Result<WorkerConnection, RelayError> {
        let url = self.endpoint(port);
        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| RelayError::Dial {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        debug!(url = %url, "Connected to worker");

        let (sink, stream) = ws.split();

        let sink = sink
            .sink_map_err(|e| RelayError::Write(e.to_string()))
            .with(|frame: Frame| future::ready(Ok::<Message, RelayError>(frame.into())));

        let stream = stream
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(message) => Frame::from_message(message).map(Ok),
                    Err(e) => Some(Err(RelayError::Read(e.to_string()))),
                })
            });

        Ok(WorkerConnection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}
