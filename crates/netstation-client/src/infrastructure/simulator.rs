//! In-process stand-in for a NetStation acquisition host.
//!
//! The simulator listens on a TCP port, reads command frames exactly the way
//! the device does (tag first, then the tag's payload), decodes them with
//! [`decode_command`], records them, and answers according to a
//! [`DeviceBehavior`].  It lets the blocking client be exercised end to end
//! without lab hardware, and powers the demo binary's `--simulate` mode.
//!
//! # Why async? (for beginners)
//!
//! The client under test blocks its thread while it waits for a reply.  The
//! simulator therefore has to run somewhere else.  Running it as a Tokio
//! task lets one runtime serve any number of test connections while the
//! client runs on a `spawn_blocking` thread.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use netstation_core::protocol::{
    codec::{decode_command, encode_response},
    messages::{Command, CommandTag, Response, ResponseCode},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// How the simulated device answers commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceBehavior {
    /// `I` + version for queries, `Z` for everything else.
    Accept,
    /// `F` + `error_code` for every command.
    Reject { error_code: u16 },
    /// Behave like [`DeviceBehavior::Accept`] for the first `commands`
    /// commands of each connection, then close without answering.
    CloseAfter { commands: usize },
    /// Behave like [`DeviceBehavior::Accept`], but hold every reply for `delay`.
    Slow { delay: Duration },
    /// Send only the `F` byte of a failure response, then close.
    HangUpMidResponse,
    /// Reply to every command with these bytes verbatim.
    Raw(Vec<u8>),
}

/// Commands received by a [`DeviceSimulator`], in arrival order.
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<Command>>>);

impl CommandLog {
    /// Returns a copy of every command received so far.
    pub fn snapshot(&self) -> Vec<Command> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn push(&self, command: Command) {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).push(command);
    }
}

/// A simulated NetStation device bound to a local TCP port.
pub struct DeviceSimulator {
    listener: TcpListener,
    behavior: DeviceBehavior,
    protocol_version: u8,
    log: CommandLog,
}

impl DeviceSimulator {
    /// Binds the simulator.  Pass port `0` to let the OS pick a free port.
    ///
    /// # Errors
    ///
    /// Returns the bind error.
    pub async fn bind(addr: SocketAddr, behavior: DeviceBehavior) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            behavior,
            protocol_version: 1,
            log: CommandLog::default(),
        })
    }

    /// Sets the version byte returned in query replies (default `1`).
    pub fn with_protocol_version(mut self, version: u8) -> Self {
        self.protocol_version = version;
        self
    }

    /// Address the simulator is listening on.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's address cannot be read.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the commands the simulator records.
    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Runs the accept loop on a new Tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Accepts connections until the task is aborted.
    pub async fn run(self) {
        info!("NetStation simulator listening ({:?})", self.behavior);
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("simulator accepted {peer}");
                    let session = Session {
                        behavior: self.behavior.clone(),
                        protocol_version: self.protocol_version,
                        log: self.log.clone(),
                    };
                    tokio::spawn(async move {
                        if let Err(e) = session.serve(stream).await {
                            warn!("simulator connection from {peer} ended: {e}");
                        }
                    });
                }
                Err(e) => {
                    warn!("simulator accept failed: {e}");
                }
            }
        }
    }
}

/// Per-connection state.
struct Session {
    behavior: DeviceBehavior,
    protocol_version: u8,
    log: CommandLog,
}

impl Session {
    async fn serve(&self, mut stream: TcpStream) -> io::Result<()> {
        let mut answered = 0usize;
        while let Some(command) = read_command(&mut stream).await? {
            debug!("simulator received {command:?}");
            self.log.push(command);

            let reply = match &self.behavior {
                DeviceBehavior::Accept => self.accept(&command),
                DeviceBehavior::Reject { error_code } => encode_response(&Response::Failure {
                    error_code: *error_code,
                }),
                DeviceBehavior::CloseAfter { commands } if answered >= *commands => {
                    debug!("simulator closing after {answered} commands");
                    return stream.shutdown().await;
                }
                DeviceBehavior::CloseAfter { .. } => self.accept(&command),
                DeviceBehavior::Slow { delay } => {
                    tokio::time::sleep(*delay).await;
                    self.accept(&command)
                }
                DeviceBehavior::HangUpMidResponse => {
                    stream.write_all(&[ResponseCode::Failure as u8]).await?;
                    return stream.shutdown().await;
                }
                DeviceBehavior::Raw(bytes) => bytes.clone(),
            };
            stream.write_all(&reply).await?;
            answered += 1;
        }
        Ok(())
    }

    fn accept(&self, command: &Command) -> Vec<u8> {
        match command {
            Command::BeginSession(_) => encode_response(&Response::QuerySuccess {
                version: self.protocol_version,
            }),
            _ => encode_response(&Response::Success),
        }
    }
}

/// Reads one complete command frame, or `None` once the client hangs up.
async fn read_command(stream: &mut TcpStream) -> io::Result<Option<Command>> {
    let mut tag_byte = [0u8; 1];
    match stream.read_exact(&mut tag_byte).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let tag = CommandTag::try_from(tag_byte[0]).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown command tag 0x{:02X}", tag_byte[0]),
        )
    })?;

    let mut frame = vec![tag_byte[0]];
    let payload_len = match tag.payload_len_hint() {
        Some(len) => len,
        None => {
            let mut len_bytes = [0u8; 2];
            stream.read_exact(&mut len_bytes).await?;
            frame.extend_from_slice(&len_bytes);
            usize::from(u16::from_ne_bytes(len_bytes))
        }
    };
    let start = frame.len();
    frame.resize(start + payload_len, 0);
    stream.read_exact(&mut frame[start..]).await?;

    let (command, _) =
        decode_command(&frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(command))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
