//! WebSocket session with the game server

use crate::game::ClientGameState;
use crate::input::{InputSource, ReportThrottle};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::protocol::{
    decode_server, encode_client, ClientMessage, JoinPayload, JoinedPayload, ProtocolError,
    ServerMessage,
};
use shared::POSITION_REPORT_HZ;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long `connect` waits for the server to answer a join.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a disconnect notice stays visible.
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

const PHYSICS_HZ: u32 = 60;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("join rejected: {0}")]
    Rejected(String),
    #[error("server did not answer the join in time")]
    JoinTimeout,
    #[error("connection closed")]
    ConnectionClosed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Shown after an unexpected disconnect until it expires.
#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectNotice {
    pub reason: String,
    pub raised_at: Instant,
}

impl DisconnectNotice {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raised_at: Instant::now(),
        }
    }

    /// True once the notice has been visible for [`NOTICE_TTL`].
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.raised_at) >= NOTICE_TTL
    }
}

/// What the front end should show.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Menu,
    Playing,
    Disconnected(DisconnectNotice),
}

impl SessionStatus {
    /// Drops an expired notice, returning to the menu.
    pub fn refresh(&mut self, now: Instant) {
        if let SessionStatus::Disconnected(notice) = self {
            if notice.is_expired(now) {
                *self = SessionStatus::Menu;
            }
        }
    }
}

/// Why [`Client::run`] returned.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// The session was closed on purpose.
    Left,
    Lost(DisconnectNotice),
}

/// The server's most recent error, kept only until the next snapshot.
///
/// The server sends an error right before closing a kicked or lost
/// connection, so an error still pending when the socket closes explains
/// the close. Errors followed by normal play were not fatal.
#[derive(Debug, Default)]
struct PendingError(Option<String>);

impl PendingError {
    fn record(&mut self, message: String) {
        self.0 = Some(message);
    }

    fn clear(&mut self) {
        self.0 = None;
    }

    /// Classifies a close frame from the server.
    fn on_close(&mut self, frame: Option<CloseFrame<'_>>) -> SessionEnd {
        let code = frame.as_ref().map(|f| f.code);
        if code == Some(CloseCode::Normal) && self.0.is_none() {
            return SessionEnd::Left;
        }
        let reason = self
            .0
            .take()
            .or_else(|| {
                frame
                    .map(|f| f.reason.into_owned())
                    .filter(|r| !r.is_empty())
            })
            .unwrap_or_else(|| "Connection closed".to_string());
        SessionEnd::Lost(DisconnectNotice::new(reason))
    }

    /// The stream ended without a close frame.
    fn on_eof(&mut self) -> SessionEnd {
        let reason = self
            .0
            .take()
            .unwrap_or_else(|| "Connection lost".to_string());
        SessionEnd::Lost(DisconnectNotice::new(reason))
    }
}

pub struct Client {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
    name: String,
    color: String,
    game: ClientGameState,
    throttle: ReportThrottle,
    last_error: PendingError,
}

impl Client {
    /// Opens a socket, joins under `name` and waits for the server's answer.
    pub async fn connect(url: &str, name: &str) -> Result<Self, ClientError> {
        info!("Connecting to {}", url);
        let (socket, _) = connect_async(url).await?;
        let (mut sink, mut stream) = socket.split();

        let join = ClientMessage::Join(JoinPayload {
            name: name.to_string(),
        });
        sink.send(Message::text(encode_client(&join)?)).await?;

        let joined = timeout(JOIN_TIMEOUT, await_joined(&mut stream))
            .await
            .map_err(|_| ClientError::JoinTimeout)??;

        let mut game = ClientGameState::new();
        game.on_joined(&joined.name, &joined.color);

        Ok(Self {
            sink,
            stream,
            name: joined.name,
            color: joined.color,
            game,
            throttle: ReportThrottle::new(POSITION_REPORT_HZ),
            last_error: PendingError::default(),
        })
    }

    /// Name as accepted by the server, trimmed.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    /// Local mirror of the session.
    pub fn game(&self) -> &ClientGameState {
        &self.game
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        let text = encode_client(message)?;
        self.sink.send(Message::text(text)).await?;
        Ok(())
    }

    /// Plays until the connection ends or `duration` elapses. An elapsed
    /// duration leaves the game cleanly.
    pub async fn run<I>(
        &mut self,
        input: &mut I,
        duration: Option<Duration>,
    ) -> Result<SessionEnd, ClientError>
    where
        I: InputSource + ?Sized,
    {
        let mut physics_interval = interval(Duration::from_secs_f64(1.0 / f64::from(PHYSICS_HZ)));
        physics_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let dt = 1.0 / PHYSICS_HZ as f32;

        let deadline = async {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                frame = self.stream.next() => {
                    if let Some(end) = self.handle_frame(frame) {
                        if let SessionEnd::Lost(notice) = &end {
                            warn!("Disconnected: {}", notice.reason);
                        }
                        self.game.reset();
                        return Ok(end);
                    }
                },

                _ = physics_interval.tick() => {
                    let intent = input.poll();
                    self.game.predict(&intent, dt);

                    if self.throttle.ready(Instant::now()) {
                        if let Some(report) = self.game.position_report() {
                            self.send(&ClientMessage::Position(report)).await?;
                        }
                    }
                    if intent.shoot {
                        if let Some(fire) = self.game.fire_request() {
                            self.send(&ClientMessage::Fire(fire)).await?;
                        }
                    }
                },

                _ = &mut deadline => {
                    self.disconnect().await?;
                    return Ok(SessionEnd::Left);
                },
            }
        }
    }

    /// Handles one incoming frame. Returns how the session ended, if it did.
    fn handle_frame(
        &mut self,
        frame: Option<Result<Message, tungstenite::Error>>,
    ) -> Option<SessionEnd> {
        match frame {
            Some(Ok(Message::Text(text))) => {
                match decode_server(&text) {
                    Ok(ServerMessage::State(state)) => {
                        self.last_error.clear();
                        let report = self.game.reconcile(&state);
                        for name in &report.added {
                            info!("{} joined", name);
                        }
                        for name in &report.removed {
                            info!("{} left", name);
                        }
                    }
                    Ok(ServerMessage::Error(error)) => {
                        warn!("Server error: {}", error.message);
                        self.last_error.record(error.message);
                    }
                    Ok(ServerMessage::Joined(_)) => debug!("Ignoring repeated joined message"),
                    Err(e) => warn!("Ignoring bad message from server: {}", e),
                }
                None
            }
            Some(Ok(Message::Close(frame))) => Some(self.last_error.on_close(frame)),
            Some(Ok(_)) => None,
            Some(Err(e)) => Some(SessionEnd::Lost(DisconnectNotice::new(format!(
                "Connection error: {e}"
            )))),
            None => Some(self.last_error.on_eof()),
        }
    }

    /// Leaves the game and closes the socket.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        info!("Leaving game as {}", self.name);
        self.send(&ClientMessage::Leave).await?;
        self.sink.close().await?;
        self.game.reset();
        Ok(())
    }
}

/// Reads frames until the server accepts or rejects the join.
async fn await_joined(stream: &mut SplitStream<WsStream>) -> Result<JoinedPayload, ClientError> {
    while let Some(frame) = stream.next().await {
        let Message::Text(text) = frame? else {
            continue;
        };
        match decode_server(&text)? {
            ServerMessage::Joined(joined) => return Ok(joined),
            ServerMessage::Error(error) => return Err(ClientError::Rejected(error.message)),
            ServerMessage::State(_) => {}
        }
    }
    Err(ClientError::ConnectionClosed)
}
