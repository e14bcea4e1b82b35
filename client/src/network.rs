use crate::game::{ClientGameState, LocalAvatar, UpdateThrottle};
use crate::input::InputSource;
use crate::rendering::RenderSink;
use log::{debug, info, warn};
use shared::{encode_line, ClientMessage, FrameError, FramedReader, ServerMessage};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const FRAME_RATE: f32 = 60.0;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    ServerClosed,
}

pub struct Client {
    server_addr: SocketAddr,
    writer: OwnedWriteHalf,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,
    receiver: JoinHandle<()>,
    game_state: ClientGameState,
    throttle: UpdateThrottle,
}

impl Client {
    /// Connects, sends `join` and starts the receive task.
    pub async fn connect(server_addr: SocketAddr, avatar: LocalAvatar) -> Result<Self, FrameError> {
        info!("Connecting to {}...", server_addr);
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(server_addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let (reader, mut writer) = stream.into_split();
        let join = ClientMessage::Join {
            name: Some(avatar.name.clone()),
            color: Some(avatar.color),
        };
        writer.write_all(encode_line(&join)?.as_bytes()).await?;

        let (tx, inbound) = mpsc::unbounded_channel();
        let receiver = tokio::spawn(receive_loop(reader, tx));

        Ok(Client {
            server_addr,
            writer,
            inbound,
            receiver,
            game_state: ClientGameState::new(avatar),
            throttle: UpdateThrottle::default(),
        })
    }

    pub fn state(&self) -> &ClientGameState {
        &self.game_state
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), FrameError> {
        let line = encode_line(message)?;
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Applies everything the receive task has queued.
    ///
    /// Returns false once the server side is gone.
    fn drain_inbound(&mut self) -> bool {
        loop {
            match self.inbound.try_recv() {
                Ok(message) => self.game_state.apply_server_message(message),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Runs the frame loop until the input source quits or the server goes away.
    pub async fn run<I, S>(&mut self, input: &mut I, sink: &mut S) -> SessionEnd
    where
        I: InputSource,
        S: RenderSink,
    {
        let mut ticker = interval(Duration::from_secs_f32(1.0 / FRAME_RATE));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_frame = Instant::now();

        let end = 'frames: loop {
            ticker.tick().await;
            let now = Instant::now();
            let dt = (now - last_frame).as_secs_f32();
            last_frame = now;

            if !self.drain_inbound() {
                warn!("Server {} closed the connection", self.server_addr);
                break SessionEnd::ServerClosed;
            }

            let intent = input.poll();
            if intent.quit {
                break SessionEnd::Quit;
            }

            self.game_state.advance(intent.movement, dt);

            let mut outgoing = Vec::with_capacity(2);
            if let Some((dx, dy)) = intent.shoot_at.and_then(|t| self.game_state.shoot_toward(t)) {
                outgoing.push(ClientMessage::Shoot { dx, dy });
            }
            if self.throttle.ready(now.into_std()) {
                let (x, y) = self.game_state.avatar().position();
                outgoing.push(ClientMessage::Update { x, y });
            }

            for message in &outgoing {
                match self.send(message).await {
                    Ok(()) => {}
                    Err(e) if e.is_recoverable() => debug!("Skipped {:?}: {}", message, e),
                    Err(e) => {
                        warn!("Lost connection to {}: {}", self.server_addr, e);
                        break 'frames SessionEnd::ServerClosed;
                    }
                }
            }

            sink.present(&self.game_state.frame());
        };

        self.shutdown().await;
        end
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.send(&ClientMessage::Quit).await {
            debug!("Could not send quit: {}", e);
        }
        if let Err(e) = self.writer.shutdown().await {
            debug!("Socket shutdown failed: {}", e);
        }
        self.receiver.abort();
    }
}

async fn receive_loop(reader: OwnedReadHalf, tx: mpsc::UnboundedSender<ServerMessage>) {
    let mut reader = FramedReader::new(reader);

    loop {
        let batch = match reader.read_batch::<ServerMessage>().await {
            Ok(batch) => batch,
            Err(FrameError::Closed) => {
                info!("Server closed the connection");
                return;
            }
            Err(e) => {
                warn!("Connection error: {}", e);
                return;
            }
        };

        for record in batch {
            match record {
                Ok(message) => {
                    if tx.send(message).is_err() {
                        return;
                    }
                }
                Err(e) => debug!("Dropping server line: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputIntent;
    use crate::rendering::RenderFrame;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    struct QuitAfter(u32);

    impl InputSource for QuitAfter {
        fn poll(&mut self) -> InputIntent {
            if self.0 == 0 {
                return InputIntent {
                    quit: true,
                    ..InputIntent::default()
                };
            }
            self.0 -= 1;
            InputIntent {
                movement: (1, 0),
                ..InputIntent::default()
            }
        }
    }

    #[derive(Default)]
    struct Frames(Vec<RenderFrame>);

    impl RenderSink for Frames {
        fn present(&mut self, frame: &RenderFrame) {
            self.0.push(frame.clone());
        }
    }

    fn avatar() -> LocalAvatar {
        LocalAvatar::new("tester".to_string(), [7, 8, 9], 100.0, 100.0)
    }

    #[tokio::test]
    async fn test_connect_sends_join_then_quit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();

            let join = lines.next_line().await.unwrap().unwrap();
            write
                .write_all(b"{\"type\":\"join_ack\",\"id\":\"7\"}\nnot json\n")
                .await
                .unwrap();

            let mut received = vec![join];
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
            }
            received
        });

        let mut client = Client::connect(addr, avatar()).await.unwrap();
        let mut frames = Frames::default();
        let end = client.run(&mut QuitAfter(10), &mut frames).await;
        assert_eq!(end, SessionEnd::Quit);

        let received = server.await.unwrap();
        assert_eq!(
            received[0],
            "{\"type\":\"join\",\"name\":\"tester\",\"color\":[7,8,9]}"
        );
        assert_eq!(received.last().unwrap(), "{\"type\":\"quit\"}");
        assert!(received.iter().any(|l| l.starts_with("{\"type\":\"update\"")));

        assert_eq!(frames.0.len(), 10);
        let last = frames.0.last().unwrap();
        assert!(last.own.x > 100.0);
    }

    #[tokio::test]
    async fn test_run_stops_when_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut client = Client::connect(addr, avatar()).await.unwrap();
        let mut frames = Frames::default();
        let end = tokio::time::timeout(
            Duration::from_secs(5),
            client.run(&mut QuitAfter(u32::MAX), &mut frames),
        )
        .await
        .unwrap();
        assert_eq!(end, SessionEnd::ServerClosed);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = Client::connect(addr, avatar()).await;
        assert!(matches!(result, Err(FrameError::Io(_))));
    }
}
