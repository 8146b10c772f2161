// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! drift-relay: WebSocket announcement relay for drift folders.
//!
//! Clients subscribe to one channel per folder identifier. When a client
//! announces a new revision, every subscriber of that channel hears about
//! it and fetches from its own remote. The relay never sees file contents.

mod server;
#[cfg(test)]
mod server_tests;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// drift-relay: announcement relay for drift folders
#[derive(Parser, Debug)]
#[command(name = "drift-relay")]
#[command(about = "WebSocket relay that forwards drift folder announcements")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:1986")]
    bind: SocketAddr,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting drift-relay on {}", args.bind);

    let state = state::RelayState::new();
    server::run(args.bind, state).await?;

    Ok(())
}
