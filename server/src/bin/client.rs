//! Console client for the guessing server.

use std::io::Write as _;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use guess_server::errors::Result;
use guess_server::models::response::{Response, ResponseMode};

#[derive(Parser)]
#[command(name = "guess-client")]
#[command(about = "Play the number guessing game from a terminal")]
struct Args {
    /// Server host
    #[arg(long, env = "GUESS_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, env = "GUESS_PORT", default_value_t = 61995)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let url = format!("ws://{}:{}/", args.host, args.port);

    let (ws_stream, _) = match connect_async(url.as_str()).await {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("Could not connect to {}: {}", url, e);
            return Err(e.into());
        }
    };
    let (mut write, mut read) = ws_stream.split();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    while let Some(msg) = read.next().await {
        let text = match msg? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let frame = match Response::from_json(&text) {
            Ok(frame) => frame,
            Err(e) => {
                eprintln!("Unreadable frame from server: {}", e);
                continue;
            }
        };

        match frame.mode {
            ResponseMode::Print => println!("{}", frame.payload),
            ResponseMode::Quit => {
                println!("{}", frame.payload);
                let _ = write.close().await;
                return Ok(());
            }
            ResponseMode::Readline => {
                print!("{}", frame.payload);
                std::io::stdout().flush()?;
                match stdin.next_line().await? {
                    Some(line) => write.send(Message::Text(line)).await?,
                    None => {
                        println!();
                        println!("Input closed, leaving the game.");
                        let _ = write.close().await;
                        return Ok(());
                    }
                }
            }
        }
    }

    println!("Connection to server lost.");
    Ok(())
}
