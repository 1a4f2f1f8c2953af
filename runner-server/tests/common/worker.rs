//! Local render worker stand-in
//!
//! Note: Some items may appear unused because they're only used in specific
//! test files.

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Binds a websocket worker that echoes text and binary frames
///
/// Returns the port it listens on.
pub async fn spawn_echo_worker() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if (msg.is_text() || msg.is_binary()) && ws.send(msg).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    port
}

/// Client side of a `/Services.Stream` connection
#[allow(dead_code)]
pub struct StreamClient {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

#[allow(dead_code)]
impl StreamClient {
    /// Connect to a stream URL issued by `Start`
    pub async fn connect(url: &str) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("Failed to connect");
        let (sink, stream) = ws.split();
        Self { sink, stream }
    }

    /// Connect without identifying the session
    pub async fn connect_bare(addr: SocketAddr) -> Self {
        Self::connect(&format!("ws://{}/Services.Stream", addr)).await
    }

    pub async fn send_text(&mut self, text: &str) {
        self.sink
            .send(Message::Text(text.to_string().into()))
            .await
            .unwrap();
    }

    pub async fn send_binary(&mut self, bytes: &[u8]) {
        self.sink
            .send(Message::Binary(bytes.to_vec().into()))
            .await
            .unwrap();
    }

    /// Next data message, or `None` once the server closes the stream
    pub async fn recv(&mut self) -> Option<Message> {
        let next = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match self.stream.next().await {
                    Some(Ok(msg)) if msg.is_text() || msg.is_binary() => return Some(msg),
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        next.expect("Timed out waiting for a message")
    }

    /// Wait for the server's close frame and return its code
    pub async fn recv_close(&mut self) -> Option<u16> {
        let next = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
                    Some(Ok(_)) => continue,
                    None | Some(Err(_)) => return None,
                }
            }
        })
        .await;
        next.expect("Timed out waiting for close")
    }

    pub async fn close(mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
    }
}
