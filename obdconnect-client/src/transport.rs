//! TCP link to the adapter
//!
//! One command goes out per [`Transport::send`], and one bounded read comes
//! back per [`Transport::receive`]. Reads are not assembled into lines; the
//! response cleaner copes with partial or merged replies, and the retry loop
//! copes with reads that come back empty.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use log::{debug, info, warn};
use obdconnect_elm327_lib::Command;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Bytes returned by one read
pub type RawFrame = Vec<u8>;

pub struct Transport {
    stream: TcpStream,
    send_delay: Duration,
    buffer: Vec<u8>,
}

impl Transport {
    /// Connect to the adapter and configure the socket.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let addr = config.addr();
        info!(
            "Connecting to OBD2 adapter at {addr} (timeout: {}ms)",
            config.connect_timeout_ms
        );

        let stream = open_stream(config).map_err(|source| Error::Connection {
            addr: addr.clone(),
            source,
        })?;

        // Give the adapter a moment before the first command
        std::thread::sleep(config.settle_delay());

        info!("Connected to OBD2 adapter at {addr}");
        Ok(Self {
            stream,
            send_delay: config.send_delay(),
            buffer: vec![0; config.read_buffer_size.max(1)],
        })
    }

    /// Write `command` + `\r`, then wait out the adapter's processing time.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        let framed = command.framed();
        debug!(
            "Sending to adapter: {:?}",
            String::from_utf8_lossy(&framed)
        );

        self.stream.write_all(&framed)?;
        std::thread::sleep(self.send_delay);
        Ok(())
    }

    /// One bounded read. Returns an empty frame if the read timed out with
    /// nothing to show; end of stream is an error.
    pub fn receive(&mut self) -> Result<RawFrame> {
        match self.stream.read(&mut self.buffer) {
            Ok(0) => Err(closed_by_peer()),
            Ok(n) => {
                debug!(
                    "Read {n} bytes from adapter: {:?}",
                    String::from_utf8_lossy(&self.buffer[..n])
                );
                Ok(self.buffer[..n].to_vec())
            }
            Err(e) if is_transient(&e) => {
                debug!("No data from adapter within read timeout");
                Ok(RawFrame::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop bytes that arrived after an earlier read, such as a late reply,
    /// so they are not taken as the answer to the next command.
    pub fn discard_pending(&mut self) -> Result<()> {
        self.stream.set_nonblocking(true)?;
        let drained = self.drain();
        self.stream.set_nonblocking(false)?;

        let discarded = drained?;
        if discarded > 0 {
            debug!("Discarded {discarded} stale bytes from adapter");
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<usize> {
        let mut discarded = 0;
        loop {
            match self.stream.read(&mut self.buffer) {
                Ok(0) => return Err(closed_by_peer()),
                Ok(n) => discarded += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(discarded),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Close both directions of the connection
    pub fn shutdown(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("Shutdown of adapter connection failed: {e}");
        }
    }
}

fn open_stream(config: &ClientConfig) -> io::Result<TcpStream> {
    let mut last_error = None;

    for addr in (config.host.as_str(), config.port).to_socket_addrs()? {
        let connected = match config.connect_timeout() {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match connected {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                stream.set_read_timeout(config.read_timeout())?;
                stream.set_write_timeout(config.read_timeout())?;
                return Ok(stream);
            }
            Err(e) => {
                warn!("Failed to connect to {addr}: {e}");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(ErrorKind::NotFound, "host resolved to no addresses")
    }))
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

fn closed_by_peer() -> Error {
    Error::Io(io::Error::new(
        ErrorKind::UnexpectedEof,
        "adapter closed the connection",
    ))
}
