//! WebSocket transport.
//!
//! [`WebSocketDriver`] implements [`Driver`] over `tokio-tungstenite`. The
//! socket is owned by a background task; the driver talks to it through two
//! channels, which makes `recv_frame` cancel-safe. Dropping the outbound
//! channel is the stop signal: the task sends a close frame and exits.
//!
//! The inbound channel is unbounded so the task never stalls on a slow reader
//! while outbound frames are waiting to be written. A socket error is
//! forwarded as the last inbound item; a close frame or EOF just ends the
//! stream.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::runtime::Driver;

/// Outbound frames buffered ahead of the socket.
const OUTBOUND_CAPACITY: usize = 64;

/// WebSocket transport errors.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Handshake with the endpoint failed.
    #[error("websocket connection failed: {0}")]
    Connection(String),

    /// Reading from the socket failed.
    #[error("websocket read failed: {0}")]
    Read(String),

    /// Writing to the socket failed.
    #[error("websocket write failed: {0}")]
    Write(String),

    /// The socket is closed or was never opened.
    #[error("websocket closed")]
    Closed,
}

type Inbound = Result<String, TransportError>;

struct ConnectedSocket {
    to_server: mpsc::Sender<String>,
    from_server: mpsc::UnboundedReceiver<Inbound>,
}

/// [`Driver`] over a WebSocket.
#[derive(Default)]
pub struct WebSocketDriver {
    connection: Option<ConnectedSocket>,
}

impl WebSocketDriver {
    /// Create a driver with no open socket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a socket is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

impl std::fmt::Debug for WebSocketDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketDriver").field("connected", &self.is_connected()).finish()
    }
}

impl Driver for WebSocketDriver {
    type Error = TransportError;

    async fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        self.stop();

        let (socket, _response) =
            connect_async(endpoint).await.map_err(|e| TransportError::Connection(e.to_string()))?;

        let (to_server, outbound) = mpsc::channel(OUTBOUND_CAPACITY);
        let (inbound, from_server) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(socket, outbound, inbound));

        self.connection = Some(ConnectedSocket { to_server, from_server });
        Ok(())
    }

    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        let connection = self.connection.as_ref().ok_or(TransportError::Closed)?;
        connection.to_server.send(frame).await.map_err(|_| TransportError::Closed)
    }

    async fn recv_frame(&mut self) -> Result<Option<String>, TransportError> {
        match self.connection.as_mut() {
            Some(connection) => connection.from_server.recv().await.transpose(),
            None => Ok(None),
        }
    }

    fn stop(&mut self) {
        self.connection = None;
    }
}

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Pump frames between the socket and the driver's channels until either side
/// goes away.
async fn run_socket(
    socket: Socket,
    mut outbound: mpsc::Receiver<String>,
    inbound: mpsc::UnboundedSender<Inbound>,
) {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                };
                if let Err(err) = write.send(Message::Text(frame.into())).await {
                    tracing::warn!(error = %err, "websocket write failed");
                    let _ = inbound.send(Err(TransportError::Write(err.to_string())));
                    break;
                }
            }
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if inbound.send(Ok(text.as_str().to_owned())).is_err() {
                        break;
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {},
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "websocket read failed");
                    let _ = inbound.send(Err(TransportError::Read(err.to_string())));
                    break;
                },
            },
        }
    }
}
