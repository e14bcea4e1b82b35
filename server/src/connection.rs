//! Per-connection handshake and receive loop.
//!
//! A connection moves through `AwaitingJoin → Joined → Closed`. Only a
//! `join` is honoured before the handshake; afterwards `update`, `shoot` and
//! `quit` drive world mutations. The receive loop is the single place that
//! decides when a connection ends, and it always leaves through
//! [`Connection::close`].

use crate::world::{ConnectionId, Outbound, WorldState, OUTBOUND_CAPACITY};
use log::{debug, info};
use shared::{ClientMessage, Color, FrameError, FramedReader, PlayerId, DEFAULT_COLOR};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingJoin,
    Joined(PlayerId),
    Closed,
}

/// Why a receive loop stopped.
#[derive(Debug)]
pub enum CloseReason {
    Quit,
    PeerClosed,
    Transport(FrameError),
    /// The world dropped the connection, e.g. the inactivity reaper.
    Evicted,
}

pub struct Connection {
    id: ConnectionId,
    phase: Phase,
    world: Arc<WorldState>,
    outbound: mpsc::Sender<Outbound>,
    close_signal: Option<oneshot::Sender<()>>,
    released: bool,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        world: Arc<WorldState>,
        outbound: mpsc::Sender<Outbound>,
        close_signal: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            phase: Phase::AwaitingJoin,
            world,
            outbound,
            close_signal: Some(close_signal),
            released: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    /// Applies one inbound message according to the current phase.
    pub async fn handle_message(&mut self, message: ClientMessage) {
        match (self.phase, message) {
            (Phase::Closed, _) => {}
            (Phase::AwaitingJoin, ClientMessage::Join { name, color }) => {
                self.join(name, color).await;
            }
            (Phase::AwaitingJoin, other) => {
                debug!("Connection {}: ignoring {:?} before join", self.id.0, other);
            }
            (Phase::Joined(id), ClientMessage::Join { .. }) => {
                debug!("Player {} sent a second join", id);
            }
            (Phase::Joined(id), ClientMessage::Update { x, y }) => {
                if !self.world.update_position(id, x, y).await {
                    debug!("Player {} sent an unusable position ({}, {})", id, x, y);
                }
            }
            (Phase::Joined(id), ClientMessage::Shoot { dx, dy }) => {
                if self.world.spawn_bullet(id, dx, dy).await.is_none() {
                    debug!("Player {} fired with an unusable direction ({}, {})", id, dx, dy);
                }
            }
            (Phase::Joined(id), ClientMessage::Quit) => {
                info!("Player {} quit", id);
                self.phase = Phase::Closed;
            }
        }
    }

    async fn join(&mut self, name: Option<String>, color: Option<Color>) {
        let Some(close_signal) = self.close_signal.take() else {
            return;
        };

        let color = color.unwrap_or(DEFAULT_COLOR);
        let id = self
            .world
            .join(self.id, name, color, self.outbound.clone(), close_signal)
            .await;

        if let Some(player) = self.world.player(id).await {
            info!(
                "Player {} ({}) joined on connection {} at ({}, {})",
                id, player.name, self.id.0, player.x, player.y
            );
        }
        self.phase = Phase::Joined(id);
    }

    /// Moves to `Closed` and releases world state. Safe to call repeatedly.
    pub async fn close(&mut self) -> Option<PlayerId> {
        self.phase = Phase::Closed;
        if self.released {
            return None;
        }
        self.released = true;
        self.world.disconnect(self.id).await
    }
}

/// Runs one client connection until it quits, drops, or is evicted.
pub async fn serve_connection(stream: TcpStream, addr: SocketAddr, world: Arc<WorldState>) {
    let conn = world.next_connection_id();
    info!("Client connected from {} (connection {})", addr, conn.0);

    let (read_half, write_half) = stream.into_split();
    let reason = serve(read_half, write_half, conn, world).await;

    match reason {
        CloseReason::Transport(e) => info!("Connection {} from {} closed: {}", conn.0, addr, e),
        other => info!("Connection {} from {} closed: {:?}", conn.0, addr, other),
    }
}

/// Drives the receive side of a connection over any byte stream.
pub async fn serve<R, W>(reader: R, writer: W, conn: ConnectionId, world: Arc<WorldState>) -> CloseReason
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let (close_tx, mut close_rx) = oneshot::channel();
    tokio::spawn(write_loop(writer, outbound_rx, conn));

    let mut connection = Connection::new(conn, world, outbound_tx, close_tx);
    let mut reader = FramedReader::new(reader);

    let reason = loop {
        let batch = tokio::select! {
            batch = reader.read_batch::<ClientMessage>() => batch,
            _ = &mut close_rx => break CloseReason::Evicted,
        };

        match batch {
            Ok(records) => {
                for record in records {
                    match record {
                        Ok(message) => connection.handle_message(message).await,
                        Err(e) => debug!("Connection {}: dropping record: {}", conn.0, e),
                    }
                    if connection.is_closed() {
                        break;
                    }
                }
            }
            Err(FrameError::Closed) => break CloseReason::PeerClosed,
            Err(e) => break CloseReason::Transport(e),
        }

        if connection.is_closed() {
            break CloseReason::Quit;
        }
    };

    if let Some(id) = connection.close().await {
        info!("Player {} left", id);
    }
    reason
}

async fn write_loop<W>(mut writer: W, mut outbound: mpsc::Receiver<Outbound>, conn: ConnectionId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = outbound.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!("Connection {}: write failed: {}", conn.0, e);
            return;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Connection {}: shutdown failed: {}", conn.0, e);
    }
}
