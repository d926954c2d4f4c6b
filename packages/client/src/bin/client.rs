//! Room-based WebSocket chat client.
//!
//! Joins a chat room with a bearer token, replays the recent history,
//! and shows live messages and presence updates. Lines typed at the
//! prompt are sent as chat messages. Automatically reconnects on
//! connection loss (max 5 attempts with 5 second interval); rejections
//! signalled by the server (bad token, unknown room, duplicate user)
//! are final.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin agora-client -- --username alice --token <token>
//! cargo run --bin agora-client -- -n bob -t <token> -r 2 -u ws://127.0.0.1:8080
//! ```

use clap::Parser;

use agora_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "agora-client")]
#[command(about = "CLI chat client for agora rooms", long_about = None)]
struct Args {
    /// Display name, used for the prompt and to mark your own messages
    #[arg(short = 'n', long)]
    username: String,

    /// Bearer token (the server logs one per seeded user at startup)
    #[arg(short = 't', long)]
    token: String,

    /// Room id to join
    #[arg(short = 'r', long, default_value = "1")]
    room: i64,

    /// Chat server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080")]
    url: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    // Run the client
    if let Err(e) = agora_client::run_client(args.url, args.room, args.token, args.username).await
    {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
