//! Mock ELM327 OBD2 adapter
//!
//! Serves one client at a time over TCP, answering AT commands and the RPM,
//! speed and coolant PIDs from a simulated vehicle. Every reply is framed
//! like the real adapter: answer text, `\r`, then the `>` prompt, in a single
//! write.

use log::{debug, error, info, warn};
use obdconnect_elm327_lib::{frame_reply, COMMAND_TERMINATOR};
use std::io::{self, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

pub mod adapter;

pub use adapter::{AdapterState, VehicleState};

/// Default ELM327 WiFi adapter port
pub const DEFAULT_PORT: u16 = 35000;

/// Pause after a failed accept
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Processing latency before each reply
    pub reply_delay: Duration,
    /// Mode 01 queries answered with `SEARCHING...` after connect or `ATZ`
    pub searching_replies: u32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            reply_delay: Duration::from_millis(10),
            searching_replies: 0,
        }
    }
}

pub struct MockServer {
    listener: TcpListener,
    config: MockConfig,
}

impl MockServer {
    pub fn bind(config: MockConfig) -> io::Result<Self> {
        let listener = TcpListener::bind((config.bind_addr.as_str(), config.port))?;
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve connections one after another, forever
    pub fn run(&self) {
        info!("Mock ELM327 ready - waiting for connections...");
        self.serve_incoming(self.listener.incoming());
    }

    /// Serve each accepted connection in turn until `incoming` runs out
    fn serve_incoming<I>(&self, incoming: I)
    where
        I: IntoIterator<Item = io::Result<TcpStream>>,
    {
        for accepted in incoming {
            match accepted {
                Ok(stream) => {
                    let peer = stream
                        .peer_addr()
                        .map_or_else(|_| "unknown peer".to_string(), |addr| addr.to_string());
                    info!("Client connected: {peer}");
                    match self.serve(stream) {
                        Ok(()) => info!("Client disconnected: {peer}"),
                        Err(e) => warn!("Session with {peer} ended: {e}"),
                    }
                    info!("Waiting for next connection...");
                }
                Err(e) => {
                    error!("Connection error: {e}");
                    std::thread::sleep(ACCEPT_ERROR_DELAY);
                }
            }
        }
    }

    /// Serve a single client until it disconnects
    pub fn serve(&self, stream: TcpStream) -> io::Result<()> {
        stream.set_nodelay(true)?;

        let mut reader = BufReader::new(&stream);
        let mut writer = &stream;
        let mut state = AdapterState::new(self.config.searching_replies);
        let mut buffer = Vec::new();

        loop {
            let mut byte = [0u8; 1];
            if reader.read(&mut byte)? == 0 {
                return Ok(());
            }

            let ch = byte[0];
            if ch == COMMAND_TERMINATOR {
                let command = String::from_utf8_lossy(&buffer).into_owned();
                buffer.clear();

                if let Some(answer) = state.handle_command(&command) {
                    debug!("RX: {command:?}");
                    std::thread::sleep(self.config.reply_delay);
                    let reply = frame_reply(&answer);
                    debug!("TX: {:?}", String::from_utf8_lossy(&reply));
                    writer.write_all(&reply)?;
                }
            } else if ch != b'\n' {
                // Accumulate command (ignore linefeeds)
                buffer.push(ch);
            }
        }
    }
}
