use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::errors::{GameError, Result};
use crate::models::game::Game;
use crate::models::response::Response;
use crate::services::game_events::{ResponseSink, TracingSink};
use crate::services::game_manager::GameManager;
use crate::services::round_coordinator::RoundCoordinator;
use crate::services::session::Session;

/// Accepts websocket clients and seats them all in one shared game.
pub struct GameServer {
    listener: TcpListener,
    coordinator: Arc<RoundCoordinator>,
    heartbeat: Duration,
}

impl GameServer {
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        Self::with_game(config, Game::new(config.rules())).await
    }

    pub async fn with_game(config: &ServerConfig, game: Game) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        Ok(GameServer {
            listener,
            coordinator: RoundCoordinator::new(game),
            heartbeat: config.heartbeat_interval(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn coordinator(&self) -> Arc<RoundCoordinator> {
        self.coordinator.clone()
    }

    pub async fn run(self) -> Result<()> {
        info!(
            addr = %self.local_addr()?,
            game_id = %self.coordinator.game_id(),
            "game server started"
        );

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };
            tokio::spawn(handle_connection(
                stream,
                peer,
                self.coordinator.clone(),
                self.heartbeat,
            ));
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    coordinator: Arc<RoundCoordinator>,
    heartbeat: Duration,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "websocket handshake failed");
            return;
        }
    };
    let game_id = coordinator.game_id();
    info!(%peer, %game_id, "client connected");

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Response>();
    let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();

    // Ends when every frame sender is gone or the peer stops accepting writes.
    let mut writer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat);
        ticker.tick().await;
        loop {
            tokio::select! {
                frame = out_rx.recv() => {
                    let Some(frame) = frame else { break };
                    debug!(%peer, mode = %frame.mode, payload = %frame.payload, "response sent");
                    if let Err(e) = write.send(Message::Text(frame.to_json())).await {
                        debug!(%peer, error = %e, "write failed");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                        debug!(%peer, error = %e, "heartbeat failed");
                        break;
                    }
                }
            }
        }
        let _ = write.close().await;
    });

    let reader = tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let line = text.trim_end_matches(['\r', '\n']).to_string();
                    debug!(%peer, %line, "client replied");
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(%peer, error = %e, "read failed");
                    break;
                }
            }
        }
    });

    let mut manager = GameManager::new(coordinator);
    manager.add_sink(Box::new(ResponseSink::new(out_tx.clone())));
    manager.add_sink(Box::new(TracingSink::new(game_id)));
    let mut session = Session::new(manager, out_tx, line_rx);

    // The reader closing the line channel surfaces as `Disconnected` once the
    // session has consumed every line that arrived before it.
    let mut writer_done = false;
    let result = tokio::select! {
        result = session.run() => result,
        _ = &mut writer => {
            writer_done = true;
            Err(GameError::Disconnected)
        }
    };

    let player_id = session.manager().player_id().map(|id| id.0);
    match &result {
        Ok(()) => info!(%peer, ?player_id, %game_id, "player quit"),
        Err(GameError::Disconnected) => info!(%peer, ?player_id, %game_id, "client disconnected"),
        Err(e) => warn!(%peer, ?player_id, %game_id, error = %e, "session ended with error"),
    }

    session.finish(result.as_ref().err()).await;
    drop(session);

    if !writer_done {
        let _ = writer.await;
    }
    reader.abort();
    debug!(%peer, "connection closed");
}
