//! Server network layer handling WebSocket connections and the authoritative game loop

use crate::client_manager::{ClientManager, ConnectionId, Outbound, SendOutcome, OUTBOUND_QUEUE_CAPACITY};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::{GameState, ReportOutcome};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::protocol::{decode_client, encode_server, ClientMessage, ProtocolError, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Longest simulation step the loop will take, however late a tick fires.
const MAX_DELTA_TIME: f32 = 0.05;
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);
/// Minimum gap between two protocol-error log lines from one connection.
const LOG_THROTTLE: Duration = Duration::from_secs(2);

const HEALTH_REQUEST: &[u8] = b"GET /health ";
const HEALTH_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK";
/// Upper bound on the request head read from a health check.
const MAX_HEALTH_REQUEST: usize = 4096;

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectKind {
    /// Client-initiated close handshake or `leave`.
    Intentional,
    /// Network failure or abnormal close, with a reason for the client.
    Unexpected(String),
}

/// Events sent from connection tasks to the server loop
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        id: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::Sender<Outbound>,
    },
    Message {
        id: ConnectionId,
        message: ClientMessage,
    },
    Closed {
        id: ConnectionId,
        kind: DisconnectKind,
    },
    Shutdown,
}

/// Asks a running server to kick everyone and stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ShutdownHandle {
    /// Requests a shutdown. Does nothing if the server already stopped.
    pub fn shutdown(&self) {
        if self.tx.send(ServerEvent::Shutdown).is_err() {
            debug!("Shutdown requested after server loop exited");
        }
    }
}

/// Main server coordinating connections and game simulation
pub struct Server {
    listener: Arc<TcpListener>,
    config: ServerConfig,
    clients: ClientManager,
    game_state: GameState,

    server_tx: mpsc::UnboundedSender<ServerEvent>,
    server_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Arc::new(listener),
            clients: ClientManager::new(config.max_clients, config.client_timeout),
            game_state: GameState::new(),
            config,
            server_tx,
            server_rx,
        })
    }

    /// Address actually bound, useful with port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// A cloneable handle that stops [`Server::run`] from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.server_tx.clone(),
        }
    }

    /// Spawns the task that accepts sockets and upgrades them to WebSockets
    fn spawn_acceptor(&self) -> tokio::task::JoinHandle<()> {
        let listener = Arc::clone(&self.listener);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut next_id: ConnectionId = 1;
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let id = next_id;
                        next_id += 1;
                        tokio::spawn(handle_connection(id, stream, addr, server_tx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Main server loop. Every mutation of game state happens here.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let acceptor = self.spawn_acceptor();

        let mut tick_interval = interval(self.config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timeout_interval = interval(Duration::from_secs(1));
        let mut last_tick = Instant::now();

        info!(
            "Server started ({} Hz, max {} clients)",
            self.config.tick_rate, self.config.max_clients
        );

        loop {
            tokio::select! {
                event = self.server_rx.recv() => {
                    match event {
                        Some(ServerEvent::Shutdown) | None => {
                            info!("Server shutting down");
                            self.kick_all("Server shutting down");
                            // Let writer tasks flush the close frames
                            tokio::time::sleep(SHUTDOWN_GRACE).await;
                            break;
                        }
                        Some(event) => self.handle_event(event),
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if dt > MAX_DELTA_TIME {
                        debug!("Large delta time ({:.3}s), capping to {:.3}s", dt, MAX_DELTA_TIME);
                        dt = MAX_DELTA_TIME;
                    }
                    self.step(dt);
                },

                _ = timeout_interval.tick() => {
                    for id in self.clients.check_timeouts() {
                        self.kick(id, "Timed out", CloseCode::Policy);
                    }
                },
            }
        }

        acceptor.abort();
        Ok(())
    }

    fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { id, addr, sender } => {
                if !self.clients.add_connection(id, addr, sender.clone()) {
                    warn!("Rejecting connection {} from {}: server full", id, addr);
                    if let Some(item) = encode_outbound(&ServerMessage::error("Server full")) {
                        let _ = sender.try_send(item);
                    }
                    let _ = sender.try_send(Outbound::Close(Some(close_frame(
                        CloseCode::Again,
                        "Server full",
                    ))));
                }
            }
            ServerEvent::Message { id, message } => {
                // Departed and kicked connections linger until their reader closes
                match self.clients.get(id) {
                    Some(connection) if connection.phase.is_live() => {}
                    _ => return,
                }
                self.clients.touch(id);
                self.handle_message(id, message);
            }
            ServerEvent::Closed { id, kind } => self.handle_disconnect(id, kind),
            ServerEvent::Shutdown => {}
        }
    }

    /// Dispatches one decoded client message
    fn handle_message(&mut self, id: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Join(payload) => {
                if self.clients.player_name(id).is_some() {
                    self.send_to(id, &ServerMessage::error("Already joined"));
                    return;
                }
                match self.game_state.join(&payload.name) {
                    Ok(joined) => {
                        self.clients.mark_joined(id, &joined.name);
                        self.send_to(id, &ServerMessage::Joined(joined));
                    }
                    Err(e) => {
                        info!("Join rejected for connection {}: {}", id, e);
                        self.send_to(id, &ServerMessage::error(e.to_string()));
                    }
                }
            }

            ClientMessage::Position(report) => {
                let Some(name) = self.clients.player_name(id).map(str::to_owned) else {
                    debug!("Position report from connection {} before join", id);
                    return;
                };
                self.clients.mark_active(id);
                match self.game_state.report_position(&name, &report) {
                    Ok(ReportOutcome::Stale) => {
                        debug!("Dropped stale report from {}", name);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Rejected report from {}: {}", name, e),
                }
            }

            ClientMessage::Fire(request) => {
                let Some(name) = self.clients.player_name(id).map(str::to_owned) else {
                    debug!("Fire request from connection {} before join", id);
                    return;
                };
                self.clients.mark_active(id);
                if let Err(e) = self.game_state.fire(&name, &request) {
                    debug!("Refused fire from {}: {}", name, e);
                }
            }

            ClientMessage::Leave => {
                if let Some(name) = self.clients.mark_left(id) {
                    self.game_state.leave(&name);
                    info!("{} left the game", name);
                }
                if let Some(connection) = self.clients.get(id) {
                    connection.send(Outbound::Close(Some(close_frame(CloseCode::Normal, "Bye"))));
                }
            }
        }
    }

    /// Removes a connection and its player. Unknown ids are ignored.
    fn handle_disconnect(&mut self, id: ConnectionId, kind: DisconnectKind) {
        let Some(connection) = self.clients.remove_connection(id) else {
            return;
        };
        if let Some(name) = &connection.player_name {
            self.game_state.leave(name);
        }

        // The server already closed kicked and departed connections
        let kind = if connection.phase.is_live() {
            kind
        } else {
            DisconnectKind::Intentional
        };

        match kind {
            DisconnectKind::Intentional => {
                debug!("Connection {} closed cleanly", id);
            }
            DisconnectKind::Unexpected(reason) => {
                warn!("Connection {} lost: {}", id, reason);
                // Best effort, the socket may already be unusable
                if let Some(item) = encode_outbound(&ServerMessage::error(reason.clone())) {
                    connection.send(item);
                }
                connection.send(Outbound::Close(Some(close_frame(CloseCode::Error, &reason))));
            }
        }
    }

    /// Notifies a connection and closes it. The player leaves immediately; the
    /// connection itself is dropped once its reader sees the close.
    fn kick(&mut self, id: ConnectionId, reason: &str, code: CloseCode) {
        let Some(name) = self.clients.get(id).map(|c| c.player_name.clone()) else {
            return;
        };
        info!("Kicking connection {}: {}", id, reason);
        if let Some(name) = name {
            self.game_state.leave(&name);
        }
        self.clients.mark_kicked(id);
        self.send_to(id, &ServerMessage::error(reason));
        if let Some(connection) = self.clients.get(id) {
            connection.send(Outbound::Close(Some(close_frame(code, reason))));
        }
    }

    fn kick_all(&mut self, reason: &str) {
        for id in self.clients.ids() {
            self.kick(id, reason, CloseCode::Away);
        }
    }

    /// Advances the canonical state by one tick and broadcasts the snapshot
    fn step(&mut self, dt: f32) {
        let report = self.game_state.tick(dt);
        if !report.hits.is_empty() {
            debug!("Tick {}: {} hits", self.game_state.tick, report.hits.len());
        }

        self.broadcast_snapshot();

        if self.game_state.tick % 60 == 0 && !self.clients.is_empty() {
            debug!(
                "Tick {}: {} connections, {} players, {} bullets, {:.1}Hz",
                self.game_state.tick,
                self.clients.len(),
                self.game_state.player_count(),
                self.game_state.bullets().len(),
                1.0 / dt.max(f32::EPSILON)
            );
        }
    }

    /// Serialises the snapshot once and queues it for every in-game connection.
    fn broadcast_snapshot(&self) {
        if self.clients.in_game().next().is_none() {
            return;
        }
        let text: Arc<str> = match encode_server(&ServerMessage::State(self.game_state.snapshot())) {
            Ok(text) => Arc::from(text),
            Err(e) => {
                error!("Failed to encode snapshot: {}", e);
                return;
            }
        };
        for connection in self.clients.in_game() {
            if connection.send(Outbound::Text(Arc::clone(&text))) == SendOutcome::Skipped {
                debug!("Connection {} is behind, skipping snapshot", connection.id);
            }
        }
    }

    fn send_to(&self, id: ConnectionId, message: &ServerMessage) {
        let Some(connection) = self.clients.get(id) else {
            return;
        };
        if let Some(item) = encode_outbound(message) {
            if connection.send(item) == SendOutcome::Skipped {
                debug!("Outbound queue full for connection {}", id);
            }
        }
    }

}

fn encode_outbound(message: &ServerMessage) -> Option<Outbound> {
    match encode_server(message) {
        Ok(text) => Some(Outbound::Text(Arc::from(text))),
        Err(e) => {
            error!("Failed to encode message: {}", e);
            None
        }
    }
}

fn close_frame(code: CloseCode, reason: &str) -> CloseFrame<'static> {
    CloseFrame {
        code,
        reason: reason.to_string().into(),
    }
}

fn is_health_request(head: &[u8]) -> bool {
    head.starts_with(HEALTH_REQUEST)
}

/// Answers `GET /health` with a plain `200 OK` if that is what the peer sent.
/// Returns `false` without consuming anything for every other request.
async fn serve_health_check(stream: &mut TcpStream) -> std::io::Result<bool> {
    let mut head = [0u8; HEALTH_REQUEST.len()];
    let peeked = stream.peek(&mut head).await?;
    if !is_health_request(&head[..peeked]) {
        return Ok(false);
    }

    let mut request: Vec<u8> = Vec::with_capacity(256);
    let mut buf = [0u8; 512];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") && request.len() < MAX_HEALTH_REQUEST {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }

    stream.write_all(HEALTH_RESPONSE).await?;
    stream.shutdown().await?;
    Ok(true)
}

/// Performs the WebSocket handshake and runs the reader and writer halves.
async fn handle_connection(
    id: ConnectionId,
    mut stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerEvent>,
) {
    match serve_health_check(&mut stream).await {
        Ok(true) => {
            debug!("Answered health check from {}", addr);
            return;
        }
        Ok(false) => {}
        Err(e) => {
            debug!("Health check from {} failed: {}", addr, e);
            return;
        }
    }

    let socket = match tokio_tungstenite::accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (sender, receiver) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    if server_tx
        .send(ServerEvent::Connected { id, addr, sender })
        .is_err()
    {
        return;
    }

    let (sink, stream) = socket.split();
    tokio::spawn(write_loop(id, sink, receiver));
    let kind = read_loop(id, stream, &server_tx).await;
    let _ = server_tx.send(ServerEvent::Closed { id, kind });
}

type WsSink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = futures_util::stream::SplitStream<WebSocketStream<TcpStream>>;

async fn write_loop(id: ConnectionId, mut sink: WsSink, mut receiver: mpsc::Receiver<Outbound>) {
    while let Some(item) = receiver.recv().await {
        match item {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::text(text.to_string())).await {
                    debug!("Write to connection {} failed: {}", id, e);
                    break;
                }
            }
            Outbound::Close(frame) => {
                let _ = sink.send(Message::Close(frame)).await;
                break;
            }
        }
    }
    let _ = sink.close().await;
}

/// Decodes incoming frames until the connection ends, then reports how it ended.
async fn read_loop(
    id: ConnectionId,
    mut stream: WsStream,
    server_tx: &mpsc::UnboundedSender<ServerEvent>,
) -> DisconnectKind {
    let mut last_protocol_log: Option<Instant> = None;

    loop {
        let error = match stream.next().await {
            Some(Ok(Message::Text(text))) => match decode_client(&text) {
                Ok(message) => {
                    if server_tx.send(ServerEvent::Message { id, message }).is_err() {
                        return DisconnectKind::Intentional;
                    }
                    continue;
                }
                Err(e) => e,
            },
            Some(Ok(Message::Binary(_))) => ProtocolError::BinaryFrame,
            Some(Ok(Message::Close(frame))) => return classify_close(frame.as_ref()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return DisconnectKind::Unexpected(format!("Connection error: {e}")),
            None => return DisconnectKind::Unexpected("Connection lost".to_string()),
        };

        if should_log(&mut last_protocol_log) {
            warn!("Ignoring bad message from connection {}: {}", id, error);
        }
    }
}

fn classify_close(frame: Option<&CloseFrame<'_>>) -> DisconnectKind {
    match frame.map(|f| f.code) {
        None | Some(CloseCode::Normal) | Some(CloseCode::Away) => DisconnectKind::Intentional,
        Some(code) => {
            DisconnectKind::Unexpected(format!("Connection closed ({})", u16::from(code)))
        }
    }
}

fn should_log(last: &mut Option<Instant>) -> bool {
    match last {
        Some(at) if at.elapsed() < LOG_THROTTLE => false,
        _ => {
            *last = Some(Instant::now());
            true
        }
    }
}
