//! Adapter session: handshake, then commands and decoded PID queries
//!
//! State changes:
//! - `Disconnected --connect--> Initializing`
//! - `Initializing --all init commands acknowledged--> Ready`
//! - `Initializing | Ready --socket error/EOF--> Closed`
//! - `any --failed connect--> Closed`
//! - `Closed --connect--> Initializing`

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::retry::{send_once, send_until_valid};
use crate::transport::Transport;
use log::{debug, info, warn};
use obdconnect_elm327_lib::{
    decode, Command, DecodedValue, PidRequest, CLEAR_TROUBLE_CODES, INIT_COMMANDS,
};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum SessionState {
    #[display("disconnected")]
    Disconnected,
    #[display("initializing")]
    Initializing,
    #[display("ready")]
    Ready,
    #[display("closed")]
    Closed,
}

/// Exclusive owner of the adapter connection
pub struct Session {
    config: ClientConfig,
    transport: Option<Transport>,
    state: SessionState,
}

impl Session {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            state: SessionState::Disconnected,
        }
    }

    /// Connect and run the initialization handshake.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let mut session = Self::new(config);
        session.connect()?;
        session.initialize()?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Open the TCP connection, replacing any previous one.
    ///
    /// On failure the session is left `Closed` with no connection.
    pub fn connect(&mut self) -> Result<()> {
        if let Some(old) = self.transport.take() {
            old.shutdown();
        }
        self.state = SessionState::Closed;

        self.transport = Some(Transport::connect(&self.config)?);
        self.state = SessionState::Initializing;
        Ok(())
    }

    /// Send the initialization sequence, each command retried until it is
    /// acknowledged. The session is ready only once every command has been.
    pub fn initialize(&mut self) -> Result<()> {
        match self.state {
            SessionState::Initializing => {}
            SessionState::Ready => self.state = SessionState::Initializing,
            state => return Err(Error::NotReady { state }),
        }

        info!("Initializing adapter...");
        for code in INIT_COMMANDS {
            let command = Command::new(code);
            match self.exchange(&command) {
                Ok(response) => debug!("{command} -> {response}"),
                Err(source) => {
                    warn!("Adapter did not acknowledge {command}: {source}");
                    return Err(Error::Handshake {
                        command: code.to_string(),
                        source: Box::new(source),
                    });
                }
            }
        }

        self.state = SessionState::Ready;
        info!("Adapter initialized");
        Ok(())
    }

    /// Ask the vehicle to clear its diagnostic trouble codes.
    ///
    /// Any non-empty reply is accepted; the adapter's answer is returned
    /// as-is and is not proof that codes were cleared.
    pub fn clear_trouble_codes(&mut self) -> Result<String> {
        self.require_ready()?;
        let response = self.exchange(&Command::new(CLEAR_TROUBLE_CODES))?;
        info!("Clear trouble codes response: {response}");
        Ok(response)
    }

    /// Send any command and return its cleaned reply
    pub fn send_raw(&mut self, command: &Command) -> Result<String> {
        self.require_ready()?;
        self.exchange(command)
    }

    /// Query one PID.
    ///
    /// A reply can clean fine and still not answer the request (another
    /// PID's late reply, `NO DATA`, a truncated payload), so the whole
    /// send and decode cycle is repeated. Every send counts against the
    /// retry policy, whether it got no usable reply or one that did not
    /// decode.
    pub fn query(&mut self, request: PidRequest) -> Result<DecodedValue> {
        self.require_ready()?;

        let command = request.command();
        let policy = self.config.retry;
        let start = Instant::now();
        let mut attempts = 0;
        let mut rejected = None;

        loop {
            attempts += 1;

            let delay = match self.with_transport(|t| send_once(t, &command))? {
                Some(response) => match decode(&response, request) {
                    Ok(value) => {
                        debug!("{command} decoded as {value} (attempt {attempts})");
                        return Ok(value);
                    }
                    Err(source) => {
                        debug!("Skipping {command} -> {response:?}: {source}");
                        rejected = Some((response, source));
                        self.config.decode_retry_delay()
                    }
                },
                None => policy.retry_delay(),
            };

            if policy.exhausted(attempts, start.elapsed()) {
                warn!("Giving up on {command} after {attempts} attempts");
                let command = command.to_string();
                return Err(match rejected {
                    Some((response, source)) => Error::DecodeFailure {
                        command,
                        attempts,
                        response,
                        source,
                    },
                    None => Error::Timeout { command, attempts },
                });
            }

            std::thread::sleep(delay);
        }
    }

    /// Query each PID in order; stops at the first failure.
    pub fn query_all(&mut self, requests: &[PidRequest]) -> Result<Vec<DecodedValue>> {
        requests.iter().map(|&request| self.query(request)).collect()
    }

    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.shutdown();
            info!("Disconnected from adapter");
        }
        self.state = SessionState::Closed;
    }

    fn require_ready(&self) -> Result<()> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(Error::NotReady { state: self.state })
        }
    }

    /// Send through the retry loop
    fn exchange(&mut self, command: &Command) -> Result<String> {
        let policy = self.config.retry;
        self.with_transport(|t| send_until_valid(t, command, &policy))
    }

    /// Run `f` on the open connection; an I/O failure closes the session.
    fn with_transport<T>(&mut self, f: impl FnOnce(&mut Transport) -> Result<T>) -> Result<T> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(Error::NotReady { state: self.state });
        };

        let result = f(transport);

        if let Err(Error::Io(e)) = &result {
            warn!("Adapter connection lost: {e}");
            self.close();
        }
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.shutdown();
        }
    }
}
