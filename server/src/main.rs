use clap::Parser;
use tracing::error;

use guess_server::config::ServerConfig;
use guess_server::errors::Result;
use guess_server::services::game_socket_service::GameServer;
use guess_server::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServerConfig::parse();
    let server = match GameServer::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, host = %config.host, port = config.port, "could not start server");
            return Err(e);
        }
    };

    server.run().await
}
