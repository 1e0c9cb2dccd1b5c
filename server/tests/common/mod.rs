#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use once_cell::sync::OnceCell;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing_subscriber::{fmt, EnvFilter};

use guess_server::config::ServerConfig;
use guess_server::models::game::{CodeGenerator, Game};
use guess_server::models::response::{Response, ResponseMode};
use guess_server::services::game_socket_service::GameServer;
use guess_server::services::round_coordinator::RoundCoordinator;

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Quiet by default; `TEST_LOG` or `RUST_LOG` turns logging up.
pub fn init_logging() {
    INITIALIZED.get_or_init(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .try_init()
            .ok();
    });
}

pub struct SameCode(pub &'static str);

impl CodeGenerator for SameCode {
    fn next_code(&mut self) -> String {
        self.0.to_string()
    }
}

pub fn config(min_players: usize, quorum_timeout_secs: u64) -> ServerConfig {
    ServerConfig {
        port: 0,
        min_players,
        quorum_timeout_secs,
        ..ServerConfig::default()
    }
}

/// Starts a server whose every round uses `code`.
pub async fn spawn_server(config: ServerConfig, code: &'static str) -> (SocketAddr, Arc<RoundCoordinator>) {
    init_logging();
    let game = Game::with_code_generator(config.rules(), Box::new(SameCode(code)));
    let server = GameServer::with_game(&config, game).await.unwrap();
    let addr = server.local_addr().unwrap();
    let coordinator = server.coordinator();
    tokio::spawn(server.run());
    (addr, coordinator)
}

const FRAME_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        TestClient { ws }
    }

    /// Connects and answers the name prompt.
    pub async fn sign_up(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.until_prompt("Enter your name: ").await;
        client.send_line(name).await;
        client
    }

    pub async fn next_frame(&mut self) -> Option<Response> {
        loop {
            let msg = tokio::time::timeout(FRAME_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for a frame");
            match msg {
                Some(Ok(Message::Text(text))) => return Some(Response::from_json(&text).unwrap()),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Reads frames up to and including the first one matching `pred`.
    pub async fn until(&mut self, pred: impl Fn(&Response) -> bool) -> Vec<Response> {
        let mut seen = Vec::new();
        loop {
            let frame = self
                .next_frame()
                .await
                .unwrap_or_else(|| panic!("connection closed; frames so far: {:?}", seen));
            let done = pred(&frame);
            seen.push(frame);
            if done {
                return seen;
            }
        }
    }

    pub async fn until_prompt(&mut self, prompt: &str) -> Vec<Response> {
        self.until(|f| f.mode == ResponseMode::Readline && f.payload == prompt)
            .await
    }

    pub async fn until_payload(&mut self, payload: &str) -> Vec<Response> {
        self.until(|f| f.payload == payload).await
    }

    pub async fn until_quit(&mut self) -> Vec<Response> {
        self.until(|f| f.mode == ResponseMode::Quit).await
    }

    pub async fn send_line(&mut self, line: &str) {
        self.ws.send(Message::Text(line.to_string())).await.unwrap();
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

pub fn payloads(frames: &[Response]) -> Vec<&str> {
    frames.iter().map(|f| f.payload.as_str()).collect()
}
