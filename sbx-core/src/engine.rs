//! Device engine: worker wiring for one server connection.
//!
//! ```text
//! socket ─► reader ─► dispatcher ─┬─► outbound ─► writer ─► socket
//!                                 └─► session events ─► file assembler ─► outbound
//!                     heartbeat ─────► outbound
//! ```
//!
//! The reader and writer live inside [`DeviceConnection`]; this module
//! runs the dispatcher loop, the file-assembler worker and the heartbeat
//! ticker, all joined by bounded channels and a shared cancellation
//! token. The session record is confined to the assembler worker; the
//! dispatcher only produces events.
//!
//! `run` returns the first fatal error: an authentication mismatch, the
//! login deadline expiring, or the peer closing the connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::{self, Credentials};
use crate::connection::{ConnectInfo, DeviceConnection};
use crate::dispatch::{Action, Dispatcher};
use crate::error::SbxError;
use crate::message::Message;
use crate::notify::StreamNotifier;
use crate::transfer::{FileAssembler, SessionEvent};

/// Keepalive period while idle.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
/// How long to wait for the server's login echo to validate.
pub const LOGIN_DEADLINE: Duration = Duration::from_secs(10);

const CHANNEL_CAPACITY: usize = 100;

// ── DeviceEngine ─────────────────────────────────────────────────

/// Owns everything one device connection needs to run.
pub struct DeviceEngine {
    credentials: Credentials,
    notifier: Option<StreamNotifier>,
    heartbeat_interval: Duration,
    login_deadline: Duration,
}

impl DeviceEngine {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            notifier: None,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            login_deadline: LOGIN_DEADLINE,
        }
    }

    /// Enable the notify-by-URL callout for pushed file tokens.
    pub fn with_notifier(mut self, notifier: StreamNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_login_deadline(mut self, deadline: Duration) -> Self {
        self.login_deadline = deadline;
        self
    }

    /// Connect to the server and run until a fatal error or cancellation.
    pub async fn connect_and_run(
        self,
        info: &ConnectInfo,
        shutdown: CancellationToken,
    ) -> Result<(), SbxError> {
        let stream = TcpStream::connect(info.addr()).await?;
        info!(addr = %info.addr(), "connected to management server");
        self.run(stream, shutdown).await
    }

    /// Run the engine over an established stream.
    pub async fn run(
        self,
        stream: TcpStream,
        shutdown: CancellationToken,
    ) -> Result<(), SbxError> {
        let mut conn = DeviceConnection::new(stream);
        let downloading = Arc::new(AtomicBool::new(false));
        let (session_tx, session_rx) = mpsc::channel::<SessionEvent>(CHANNEL_CAPACITY);
        let (auth_tx, auth_rx) = watch::channel(false);

        Self::spawn_assembler(
            session_rx,
            conn.sender(),
            Arc::clone(&downloading),
            auth_tx,
            shutdown.clone(),
        );
        self.spawn_heartbeat(conn.sender(), Arc::clone(&downloading), shutdown.clone());

        // Login first; the server checks the token against the same
        // alignment window.
        conn.send(Message::login(auth::login_token(&self.credentials)))
            .await?;

        let dispatcher = Dispatcher::new(self.credentials.clone());
        let deadline = tokio::time::sleep(self.login_deadline);
        tokio::pin!(deadline);

        let result = 'drive: loop {
            tokio::select! {
                _ = shutdown.cancelled() => break 'drive Ok(()),

                _ = &mut deadline, if !*auth_rx.borrow() => {
                    break 'drive Err(SbxError::Timeout(self.login_deadline));
                }

                maybe = conn.recv() => {
                    let Some(message) = maybe else {
                        break 'drive Err(SbxError::ConnectionClosed);
                    };
                    for action in dispatcher.dispatch(message) {
                        match action {
                            Action::Reply(reply) => {
                                if let Err(e) = conn.send(reply).await {
                                    break 'drive Err(e);
                                }
                            }
                            Action::Session(event) => {
                                if let Err(e) = session_tx.send(event).await {
                                    break 'drive Err(e.into());
                                }
                            }
                            Action::Notify(token) => match &self.notifier {
                                Some(notifier) => notifier.spawn(token),
                                None => debug!(%token, "no notify target configured"),
                            },
                            Action::CloseConnection => {
                                break 'drive Err(SbxError::AuthMismatch);
                            }
                        }
                    }
                }
            }
        };

        // Stop the workers whatever the exit reason was.
        shutdown.cancel();
        result
    }

    /// File-assembler worker: sole owner of the session record.
    fn spawn_assembler(
        mut session_rx: mpsc::Receiver<SessionEvent>,
        outbound: mpsc::Sender<Message>,
        downloading: Arc<AtomicBool>,
        auth_tx: watch::Sender<bool>,
        shutdown: CancellationToken,
    ) {
        tokio::spawn(async move {
            let mut assembler = FileAssembler::new(downloading);
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    ev = session_rx.recv() => match ev {
                        Some(ev) => ev,
                        None => break,
                    },
                };
                let ack = assembler.handle(event);
                if assembler.session().is_authenticated() {
                    auth_tx.send_replace(true);
                }
                if let Some(ack) = ack {
                    if outbound.send(ack).await.is_err() {
                        break;
                    }
                }
            }
        });
    }

    /// Heartbeat ticker: enqueues a keepalive unless a download is in
    /// progress, in which case the tick is skipped with no backlog.
    fn spawn_heartbeat(
        &self,
        outbound: mpsc::Sender<Message>,
        downloading: Arc<AtomicBool>,
        shutdown: CancellationToken,
    ) {
        let period = self.heartbeat_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if !downloading.load(Ordering::SeqCst)
                            && outbound.send(Message::heartbeat()).await.is_err()
                        {
                            break;
                        }
                    }
                }
            }
        });
    }
}
