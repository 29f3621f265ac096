//! Scripted adapters for socket-level tests

use crate::config::ClientConfig;
use crate::retry::RetryPolicy;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A one-connection adapter whose replies come from a closure.
///
/// The closure gets the 1-based number of the command and its text, and
/// returns the raw bytes to write back, or `None` to hang up. The listener
/// is closed once the connection is accepted, so later connects are refused.
pub(crate) struct ScriptedAdapter {
    pub addr: SocketAddr,
    /// Commands received so far
    pub commands: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    pub fn start<F>(mut reply: F) -> Self
    where
        F: FnMut(usize, &str) -> Option<Vec<u8>> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let commands = Arc::new(AtomicUsize::new(0));
        let counter = commands.clone();

        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(listener);
            let mut reader = BufReader::new(&stream);
            let mut writer = &stream;
            let mut buffer = Vec::new();

            loop {
                buffer.clear();
                match reader.read_until(b'\r', &mut buffer) {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
                let command = String::from_utf8_lossy(&buffer).trim().to_string();
                let count = counter.fetch_add(1, Ordering::SeqCst) + 1;

                match reply(count, &command) {
                    Some(bytes) => {
                        if writer.write_all(&bytes).is_err() {
                            return;
                        }
                    }
                    None => return,
                }
            }
        });

        Self { addr, commands }
    }
}

/// Client settings with short delays for loopback tests
pub(crate) fn fast_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        connect_timeout_ms: 1000,
        read_timeout_ms: 1000,
        settle_delay_ms: 0,
        send_delay_ms: 5,
        decode_retry_delay_ms: 5,
        retry: RetryPolicy {
            retry_delay_ms: 5,
            max_attempts: Some(10),
            max_elapsed_ms: None,
        },
        ..ClientConfig::default()
    }
}
