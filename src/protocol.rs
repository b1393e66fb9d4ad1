//! TCP protocol for live tracking sessions.
//!
//! Length-delimited bincode frames. The client streams landmark frames in
//! capture order; the server answers with positioning guidance until the
//! subject is centered, then with the running repetition count.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, error, info, warn};

use crate::config::LiveConfig;
use crate::pose::{Frame, Landmark};
use crate::tracker::{FrameThrottle, LiveTracker, Positioning, TrackerUpdate};

// --- Message types ---

/// Client → server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// One detection result. An empty landmark list means no pose detected.
    Frame { timestamp_us: u64, landmarks: Vec<Landmark> },
    Reset,
    Ping,
}

/// Server → client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Positioning { direction: Positioning },
    Counter { count: u32 },
    Pong,
    Error { message: String },
}

impl From<TrackerUpdate> for ServerMessage {
    fn from(update: TrackerUpdate) -> Self {
        match update {
            TrackerUpdate::Positioning(direction) => ServerMessage::Positioning { direction },
            TrackerUpdate::Counter { count, .. } => ServerMessage::Counter { count },
        }
    }
}

// --- Session ---

/// Per-connection state: one tracker, one throttle.
pub struct LiveSession {
    tracker: LiveTracker,
    throttle: FrameThrottle,
}

impl LiveSession {
    pub fn new(config: &LiveConfig) -> Self {
        Self {
            tracker: LiveTracker::new(config),
            throttle: FrameThrottle::from_config(config),
        }
    }

    pub fn tracker(&self) -> &LiveTracker {
        &self.tracker
    }

    /// Handle one client message received at `now`.
    ///
    /// Returns `None` for frames dropped by the throttle.
    pub fn handle(&mut self, msg: ClientMessage, now: Instant) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Ping => Some(ServerMessage::Pong),
            ClientMessage::Reset => {
                self.tracker.reset();
                self.throttle.reset();
                Some(ServerMessage::Counter { count: 0 })
            }
            ClientMessage::Frame { timestamp_us, landmarks } => {
                if !self.throttle.accept(now) {
                    debug!(timestamp_us, "frame dropped by throttle");
                    return None;
                }
                let frame = if landmarks.is_empty() {
                    Frame::empty()
                } else {
                    match Frame::from_landmarks(landmarks) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(timestamp_us, "invalid frame: {}", e);
                            return Some(ServerMessage::Error { message: e.to_string() });
                        }
                    }
                };
                Some(self.tracker.process(&frame).into())
            }
        }
    }
}

// --- Server ---

/// Back-off after a failed accept (e.g. EMFILE) before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Run one client session until the peer disconnects.
pub async fn handle_connection(socket: TcpStream, addr: SocketAddr, config: LiveConfig) -> anyhow::Result<()> {
    socket.set_nodelay(true)?;
    let mut stream = message_stream(socket);
    let mut session = LiveSession::new(&config);

    loop {
        let msg: ClientMessage = match recv_message(&mut stream).await {
            Ok(msg) => msg,
            Err(e) => {
                info!(%addr, "session ended: {:#}", e);
                break;
            }
        };
        if let Some(reply) = session.handle(msg, Instant::now()) {
            if let ServerMessage::Error { message } = &reply {
                warn!(%addr, "rejected frame: {}", message);
            }
            send_message(&mut stream, &reply).await?;
        }
    }

    info!(%addr, reps = session.tracker().rep_count(), "client disconnected");
    Ok(())
}

/// Accept connections forever, one task and one session per client.
///
/// A failed accept is logged and retried; it never stops the server.
pub async fn serve(listener: TcpListener, config: LiveConfig) {
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("accept failed: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };
        info!(%addr, "client connected");
        let live = config.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, addr, live).await {
                error!(%addr, "connection error: {:#}", e);
            }
        });
    }
}

// --- TCP codec helpers ---

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(1024 * 1024) // 1MB
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T: Serialize>(
    stream: &mut MessageStream,
    msg: &T,
) -> anyhow::Result<()> {
    let data = bincode::serialize(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message.
pub async fn recv_message<T: DeserializeOwned>(
    stream: &mut MessageStream,
) -> anyhow::Result<T> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(bincode::deserialize(&bytes)?),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}
