//! Mock ELM327 OBD2 adapter for testing the obdconnect client
//!
//! Usage: cargo run -p obdconnect-mock-elm327-server
//! Then point the client at 127.0.0.1:35000

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use obdconnect_mock_elm327_server::{MockConfig, MockServer, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "obdconnect-mock-elm327")]
#[command(about = "Simulated ELM327 adapter with dynamic RPM, speed and coolant data")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Delay before each reply in milliseconds
    #[arg(short, long, default_value = "10")]
    reply_delay_ms: u64,

    /// Answer this many PID queries with SEARCHING... after each reset
    #[arg(short, long, default_value = "0")]
    searching: u32,

    /// Log every command and reply
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = MockConfig {
        bind_addr: args.bind,
        port: args.port,
        reply_delay: Duration::from_millis(args.reply_delay_ms),
        searching_replies: args.searching,
    };

    info!(
        "Mock ELM327 starting on {}:{}...",
        config.bind_addr, config.port
    );
    let server = MockServer::bind(config.clone())
        .with_context(|| format!("Failed to bind {}:{}", config.bind_addr, config.port))?;

    server.run();
    Ok(())
}
