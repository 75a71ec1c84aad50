//! Server network layer handling TCP sessions and the quiz loop

use crate::client_manager::{ClientManager, Outgoing};
use crate::protocol::{dispatch, handle_disconnect, handle_message};
use crate::quiz::QuizMaster;
use log::{debug, error, info, warn};
use shared::{
    encode_frame, ClientMessage, DEFAULT_PORT, DEFAULT_QUIZ_INTERVAL_SECS, MAX_FRAME_LEN,
};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Shortest quiz period the server will run with
pub const MIN_QUIZ_INTERVAL: Duration = Duration::from_millis(100);

/// Settings for a [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub quiz_interval: Duration,
    pub max_clients: usize,
    /// Fixed RNG seed for reproducible quizzes
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", DEFAULT_PORT),
            quiz_interval: Duration::from_secs(DEFAULT_QUIZ_INTERVAL_SECS),
            max_clients: 64,
            seed: None,
        }
    }
}

/// Events sent from connection tasks to the coordinator loop
///
/// Accepting happens on the coordinator itself, which registers the session
/// directly, so there is no connect event.
#[derive(Debug)]
pub enum ServerEvent {
    Received {
        client_id: u32,
        message: ClientMessage,
    },
    Error {
        client_id: u32,
        error: std::io::Error,
    },
    Disconnected {
        client_id: u32,
    },
}

/// Main server coordinating sessions and quiz rounds
pub struct Server {
    listener: TcpListener,
    clients: ClientManager,
    quiz: QuizMaster,
    quiz_interval: Duration,
    readers: HashMap<u32, JoinHandle<()>>,

    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.address).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            clients: ClientManager::new(config.max_clients),
            quiz: QuizMaster::new(config.seed),
            quiz_interval: config.quiz_interval.max(MIN_QUIZ_INTERVAL),
            readers: HashMap::new(),
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs until Ctrl+C is received
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Main loop: accepts connections, applies session events in arrival
    /// order and fires quiz ticks, until `shutdown` resolves
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        // First round opens one full interval after startup
        let mut quiz_timer = interval_at(Instant::now() + self.quiz_interval, self.quiz_interval);
        quiz_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Server started successfully");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Server shutting down, closing {} sessions", self.clients.len());
                    self.clients.disconnect_all();
                    for (_, reader) in self.readers.drain() {
                        reader.abort();
                    }
                    break;
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.accept(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                }

                Some(event) = self.event_rx.recv() => {
                    self.handle_event(event);
                }

                _ = quiz_timer.tick() => {
                    let actions = self.quiz.tick(&mut self.clients);
                    dispatch(&self.clients, actions);
                }
            }
        }

        Ok(())
    }

    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let Some(client_id) = self.clients.add_client(addr, outbound_tx) else {
            warn!("Rejecting {}: server full", addr);
            // Dropping the stream closes the connection
            return;
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }

        let (reader, writer) = stream.into_split();
        let reader = spawn_session_reader(client_id, reader, self.event_tx.clone());
        self.readers.insert(client_id, reader);
        spawn_session_writer(client_id, writer, outbound_rx, self.event_tx.clone());
    }

    fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Received { client_id, message } => {
                debug!("Client {} sent {:?}", client_id, message);
                let actions = handle_message(&mut self.clients, client_id, message);
                dispatch(&self.clients, actions);
            }
            ServerEvent::Error { client_id, error } => {
                let who = self
                    .clients
                    .get(&client_id)
                    .and_then(|session| session.user_name.clone())
                    .unwrap_or_else(|| format!("client {}", client_id));
                error!("Error from {}: {}", who, error);
            }
            ServerEvent::Disconnected { client_id } => {
                if let Some(reader) = self.readers.remove(&client_id) {
                    reader.abort();
                }
                let actions = handle_disconnect(&mut self.clients, client_id);
                dispatch(&self.clients, actions);
            }
        }
    }
}

/// Spawns task that reads newline-delimited frames from one client
///
/// The buffered reader reassembles frames split across TCP segments.
/// Frames that are not valid UTF-8 or not a valid message are dropped.
/// A line longer than [`MAX_FRAME_LEN`] ends the session.
fn spawn_session_reader(
    client_id: u32,
    reader: OwnedReadHalf,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut frame = Vec::new();
        let limit = MAX_FRAME_LEN as u64 + 1;

        loop {
            frame.clear();
            let read = (&mut reader).take(limit).read_until(b'\n', &mut frame).await;
            match read {
                Ok(0) => {
                    let _ = event_tx.send(ServerEvent::Disconnected { client_id });
                    break;
                }
                Ok(n) if n > MAX_FRAME_LEN && frame.last() != Some(&b'\n') => {
                    warn!(
                        "Client {} sent a line over {} bytes, closing",
                        client_id, MAX_FRAME_LEN
                    );
                    let _ = event_tx.send(ServerEvent::Disconnected { client_id });
                    break;
                }
                Ok(_) => {
                    let Ok(line) = std::str::from_utf8(&frame) else {
                        warn!("Dropping non-UTF-8 frame from client {}", client_id);
                        continue;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    match ClientMessage::parse(line) {
                        Ok(message) => {
                            if event_tx
                                .send(ServerEvent::Received { client_id, message })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping frame from client {}: {}", client_id, e),
                    }
                }
                Err(error) => {
                    let _ = event_tx.send(ServerEvent::Error { client_id, error });
                    let _ = event_tx.send(ServerEvent::Disconnected { client_id });
                    break;
                }
            }
        }
    })
}

/// Spawns task that drains one client's outbound queue onto its socket
fn spawn_session_writer(
    client_id: u32,
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<Outgoing>,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
) {
    tokio::spawn(async move {
        while let Some(item) = outbound_rx.recv().await {
            let message = match item {
                Outgoing::Message(message) => message,
                Outgoing::Close => {
                    if let Err(e) = writer.shutdown().await {
                        debug!("Error closing client {}: {}", client_id, e);
                    }
                    return;
                }
            };

            let frame = match encode_frame(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Failed to encode {:?}: {}", message, e);
                    continue;
                }
            };

            if let Err(error) = writer.write_all(&frame).await {
                let _ = event_tx.send(ServerEvent::Error { client_id, error });
                let _ = event_tx.send(ServerEvent::Disconnected { client_id });
                return;
            }
        }
    });
}
