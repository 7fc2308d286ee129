//! Framed TCP connection with background reader and writer tasks.
//!
//! The socket is split once: the reader task is the only reader and the
//! writer task is the only writer, so no further locking is needed around
//! the stream. User code talks to both through bounded mpsc channels.

use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_util::codec::Framed;
use tracing::warn;

use crate::codec::SbxCodec;
use crate::error::SbxError;
use crate::message::Message;

/// Sender half handed to workers that produce outbound messages.
pub type OutboundSender = mpsc::Sender<Message>;

const CHANNEL_CAPACITY: usize = 100;

/// A device connection to the management server.
#[derive(Debug)]
pub struct DeviceConnection {
    // Channel into the background writer task.
    tx: mpsc::Sender<Message>,
    // Channel out of the background reader task.
    rx: mpsc::Receiver<Message>,
}

impl DeviceConnection {
    pub fn new(stream: TcpStream) -> Self {
        let (mut net_writer, mut net_reader) = Framed::new(stream, SbxCodec).split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel(CHANNEL_CAPACITY);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel(CHANNEL_CAPACITY);

        // Writer task: the sole writer on the socket.
        tokio::spawn(async move {
            while let Some(message) = network_rx.recv().await {
                if let Err(e) = net_writer.send(message).await {
                    warn!("network write error: {e}");
                    break;
                }
            }
        });

        // Reader task: the sole reader on the socket.
        tokio::spawn(async move {
            while let Some(result) = net_reader.next().await {
                match result {
                    Ok(message) => {
                        if network_tx.send(message).await.is_err() {
                            // Receiver dropped, stop reading.
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("network read error: {e}");
                        break;
                    }
                }
            }
        });

        Self {
            tx: user_tx,
            rx: user_rx,
        }
    }

    pub async fn connect(info: &ConnectInfo) -> Result<Self, SbxError> {
        let stream = TcpStream::connect(info.addr()).await?;
        Ok(Self::new(stream))
    }

    pub async fn send(&self, message: Message) -> Result<(), SbxError> {
        self.tx.send(message).await?;
        Ok(())
    }

    /// Receive the next decoded inbound message.
    ///
    /// Returns `None` once the reader task has stopped (peer closed the
    /// connection or an unrecoverable read error occurred).
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn sender(&self) -> OutboundSender {
        self.tx.clone()
    }
}

// ── ConnectInfo ──────────────────────────────────────────────────

/// Server endpoint for the persistent TCP link.
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    host: String,
    port: u16,
}

impl ConnectInfo {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_info_addr() {
        let info = ConnectInfo::new("127.0.0.1".to_string(), 10808);
        assert_eq!(info.addr(), "127.0.0.1:10808");
        assert_eq!(info.host(), "127.0.0.1");
        assert_eq!(info.port(), 10808);
    }
}
