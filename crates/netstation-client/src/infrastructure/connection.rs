//! Blocking TCP connection to a NetStation acquisition host.
//!
//! [`EgiConnection`] owns at most one socket and one reusable frame buffer.
//! Every public send operation encodes a frame, passes it through
//! [`exchange`], and waits for the single response that the protocol
//! guarantees before returning.  Because every operation takes `&mut self`,
//! two commands can never be in flight on the same connection.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use netstation_core::protocol::{
    codec::{encode_command_into, ProtocolError},
    messages::{
        Command, EventCode, EventMarker, Response, ResponseCode, SystemSpec, MAX_FRAME_SIZE,
    },
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::recorder::{CommandError, EventRecorder};
use crate::infrastructure::transport::{recv_all, send_all};

/// Errors that can occur while establishing the connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The TCP handshake with the device failed.
    #[error("failed to connect to NetStation at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The socket was opened but could not be configured.
    #[error("failed to configure socket: {0}")]
    SocketOption(#[source] std::io::Error),
}

/// Optional bounds on the otherwise unbounded blocking socket calls.
///
/// Both default to `None`: the client waits as long as the device does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Read and write timeout applied to the socket after connecting.
    pub io_timeout: Option<Duration>,
    /// Upper bound on the TCP handshake.
    pub connect_timeout: Option<Duration>,
}

/// Sends one frame and reads back exactly one response.
///
/// Fails if the frame is not fully sent, the response code byte does not
/// arrive, the code is not one of `I`, `Z`, `F`, or the code's trailing
/// payload is incomplete.  A device rejection (`F`) is a *successful*
/// exchange here; [`EgiConnection`]'s send methods turn it into
/// [`CommandError::DeviceFailure`].
///
/// # Errors
///
/// Returns [`CommandError::ShortSend`], [`CommandError::ShortReceive`], or
/// [`CommandError::Protocol`].
pub fn exchange<S: Read + Write + ?Sized>(
    stream: &mut S,
    frame: &[u8],
) -> Result<Response, CommandError> {
    let sent = send_all(stream, frame);
    if sent != frame.len() {
        return Err(CommandError::ShortSend {
            sent,
            expected: frame.len(),
        });
    }

    let mut code_byte = [0u8; 1];
    let received = recv_all(stream, &mut code_byte);
    if received != code_byte.len() {
        return Err(CommandError::ShortReceive {
            received,
            expected: code_byte.len(),
        });
    }
    let code = ResponseCode::try_from(code_byte[0])
        .map_err(|_| ProtocolError::UnknownResponseCode(code_byte[0]))?;

    // Longest response payload is the two-byte failure code.
    let mut payload_buf = [0u8; 2];
    let payload = &mut payload_buf[..code.payload_len()];
    let received = recv_all(stream, payload);
    if received != payload.len() {
        return Err(CommandError::ShortReceive {
            received,
            expected: payload.len(),
        });
    }

    Ok(Response::from_parts(code, payload)?)
}

/// A connection to one NetStation acquisition host.
///
/// # Lifecycle
///
/// ```text
/// new() ──connect()──▶ connected ──disconnect()/drop──▶ unconnected
///            ▲                │
///            └──connect()─────┘   (re-connecting tears down the old socket)
/// ```
///
/// # Examples
///
/// ```rust,no_run
/// use std::net::Ipv4Addr;
/// use netstation_client::infrastructure::connection::EgiConnection;
/// use netstation_core::{EventCode, SystemSpec};
///
/// let mut conn = EgiConnection::new();
/// conn.connect(Ipv4Addr::new(10, 10, 10, 42), 55513)?;
/// conn.send_begin_session(SystemSpec::native())?;
/// conn.send_begin_recording()?;
/// conn.send_trigger(EventCode::new(*b"stim"), 1000, 50)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct EgiConnection {
    stream: Option<TcpStream>,
    /// Reused for every outgoing frame.
    command_buffer: Vec<u8>,
    options: TransportOptions,
    protocol_version: Option<u8>,
}

impl EgiConnection {
    /// Creates an unconnected `EgiConnection` with no timeouts.
    pub fn new() -> Self {
        Self::with_options(TransportOptions::default())
    }

    /// Creates an unconnected `EgiConnection` with the given timeouts.
    pub fn with_options(options: TransportOptions) -> Self {
        Self {
            stream: None,
            command_buffer: Vec::with_capacity(MAX_FRAME_SIZE),
            options,
            protocol_version: None,
        }
    }

    /// Connects to the device at `address:port`.
    ///
    /// Any existing connection is closed first.  Nagle's algorithm is
    /// disabled so each frame leaves immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if the handshake fails or the socket cannot be
    /// configured.  The connection is left unconnected in either case.
    pub fn connect(&mut self, address: Ipv4Addr, port: u16) -> Result<(), ConnectError> {
        self.disconnect();

        let addr = SocketAddr::from((address, port));
        let stream = match self.options.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|source| ConnectError::ConnectFailed { addr, source })?;

        // `stream` is dropped (and closed) if any option fails.
        stream.set_nodelay(true).map_err(ConnectError::SocketOption)?;
        stream
            .set_read_timeout(self.options.io_timeout)
            .map_err(ConnectError::SocketOption)?;
        stream
            .set_write_timeout(self.options.io_timeout)
            .map_err(ConnectError::SocketOption)?;

        info!("connected to NetStation at {addr}");
        self.stream = Some(stream);
        Ok(())
    }

    /// Closes the socket if one is open.  Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone; the socket is released on drop regardless.
            let _ = stream.shutdown(Shutdown::Both);
            info!("disconnected from NetStation");
        }
        self.protocol_version = None;
    }

    /// Returns `true` while a socket is open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Address of the connected device, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    /// Protocol version reported by the device's last query reply.
    pub fn protocol_version(&self) -> Option<u8> {
        self.protocol_version
    }

    /// Encodes `command`, sends it, and returns the device's raw response.
    ///
    /// A `Failure` response is returned as `Ok`; use the typed `send_*`
    /// methods to have it reported as [`CommandError::DeviceFailure`].
    ///
    /// A failed exchange closes the connection: whatever the device sends
    /// afterwards can no longer be paired with the command that caused it.
    /// Every later call returns [`CommandError::NotConnected`] until
    /// [`EgiConnection::connect`] succeeds again.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NotConnected`] without touching the network if
    /// no socket is open, otherwise whatever [`exchange`] reports.
    pub fn send_command(&mut self, command: &Command) -> Result<Response, CommandError> {
        let stream = self.stream.as_mut().ok_or(CommandError::NotConnected)?;
        encode_command_into(command, &mut self.command_buffer);

        let response = match exchange(stream, &self.command_buffer) {
            Ok(response) => response,
            Err(e) => {
                warn!("{:?} exchange failed, dropping connection: {e}", command.tag());
                self.disconnect();
                return Err(e);
            }
        };
        debug!("{:?} -> {:?}", command.tag(), response);

        if let Response::QuerySuccess { version } = response {
            self.protocol_version = Some(version);
        }
        Ok(response)
    }

    /// Opens a session, declaring the host byte order with `spec`.
    ///
    /// # Errors
    ///
    /// See [`EgiConnection::send_command`]; a device rejection is reported as
    /// [`CommandError::DeviceFailure`].
    pub fn send_begin_session(&mut self, spec: SystemSpec) -> Result<(), CommandError> {
        self.send_accepted(&Command::BeginSession(spec))
    }

    /// Closes the session.
    pub fn send_end_session(&mut self) -> Result<(), CommandError> {
        self.send_accepted(&Command::EndSession)
    }

    /// Starts recording.
    pub fn send_begin_recording(&mut self) -> Result<(), CommandError> {
        self.send_accepted(&Command::BeginRecording)
    }

    /// Stops recording.
    pub fn send_end_recording(&mut self) -> Result<(), CommandError> {
        self.send_accepted(&Command::EndRecording)
    }

    /// Takes control of the device ahead of a synch or trigger.
    pub fn send_attention(&mut self) -> Result<(), CommandError> {
        self.send_accepted(&Command::Attention)
    }

    /// Sends a time-synchronization point.
    pub fn send_synch(&mut self, timestamp: i32) -> Result<(), CommandError> {
        self.send_accepted(&Command::TimeSynch(timestamp))
    }

    /// Injects an event marker into the recording.
    pub fn send_trigger(
        &mut self,
        code: EventCode,
        timestamp: i32,
        duration_ms: i32,
    ) -> Result<(), CommandError> {
        self.send_accepted(&Command::Event(EventMarker {
            code,
            timestamp,
            duration_ms,
        }))
    }

    fn send_accepted(&mut self, command: &Command) -> Result<(), CommandError> {
        match self.send_command(command)? {
            Response::Failure { error_code } => {
                warn!("{:?} rejected by device (error code {error_code})", command.tag());
                Err(CommandError::DeviceFailure { code: error_code })
            }
            Response::Success | Response::QuerySuccess { .. } => Ok(()),
        }
    }
}

impl Default for EgiConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EgiConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl EventRecorder for EgiConnection {
    fn begin_session(&mut self, spec: SystemSpec) -> Result<(), CommandError> {
        self.send_begin_session(spec)
    }

    fn end_session(&mut self) -> Result<(), CommandError> {
        self.send_end_session()
    }

    fn begin_recording(&mut self) -> Result<(), CommandError> {
        self.send_begin_recording()
    }

    fn end_recording(&mut self) -> Result<(), CommandError> {
        self.send_end_recording()
    }

    fn attention(&mut self) -> Result<(), CommandError> {
        self.send_attention()
    }

    fn synch(&mut self, timestamp: i32) -> Result<(), CommandError> {
        self.send_synch(timestamp)
    }

    fn trigger(
        &mut self,
        code: EventCode,
        timestamp: i32,
        duration_ms: i32,
    ) -> Result<(), CommandError> {
        self.send_trigger(code, timestamp, duration_ms)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io;
    use std::net::TcpListener;
    use std::thread;

    use mockall::Sequence;

    use super::*;
    use crate::infrastructure::transport::MockStream;

    /// Scripts `stream` to accept any frame whole and then serve `reply`
    /// one byte per read, reporting EOF once it runs out.
    fn scripted(reply: &'static [u8]) -> MockStream {
        let mut stream = MockStream::new();
        stream
            .expect_write()
            .returning(|buf: &[u8]| Ok(buf.len()));
        let mut pending = reply.iter().copied();
        stream.expect_read().returning(move |buf: &mut [u8]| {
            match pending.next() {
                Some(byte) => {
                    buf[0] = byte;
                    Ok(1)
                }
                None => Ok(0),
            }
        });
        stream
    }

    // ── exchange ──────────────────────────────────────────────────────────────

    #[test]
    fn test_exchange_plain_success() {
        let mut stream = scripted(b"Z");
        let response = exchange(&mut stream, b"B").expect("exchange");
        assert_eq!(response, Response::Success);
    }

    #[test]
    fn test_exchange_query_success_reads_version() {
        let mut stream = scripted(&[b'I', 4]);
        let response = exchange(&mut stream, b"QNTEL").expect("exchange");
        assert_eq!(response, Response::QuerySuccess { version: 4 });
    }

    #[test]
    fn test_exchange_failure_is_a_complete_exchange() {
        // Arrange: 'F' followed by error code 1 in native order.
        static REPLY: [u8; 3] = {
            let code = 1u16.to_ne_bytes();
            [b'F', code[0], code[1]]
        };
        let mut stream = scripted(&REPLY);

        // Act
        let response = exchange(&mut stream, b"E").expect("exchange");

        // Assert
        assert_eq!(response, Response::Failure { error_code: 1 });
    }

    #[test]
    fn test_exchange_unknown_code_is_protocol_violation() {
        let mut stream = scripted(b"Y");
        let result = exchange(&mut stream, b"A");
        assert!(matches!(
            result,
            Err(CommandError::Protocol(ProtocolError::UnknownResponseCode(b'Y')))
        ));
    }

    #[test]
    fn test_exchange_short_send_does_not_wait_for_response() {
        // Arrange
        let mut stream = MockStream::new();
        let mut seq = Sequence::new();
        stream
            .expect_write()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(1));
        stream
            .expect_write()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        stream.expect_read().never();

        // Act
        let result = exchange(&mut stream, b"QNTEL");

        // Assert
        assert!(matches!(
            result,
            Err(CommandError::ShortSend {
                sent: 1,
                expected: 5
            })
        ));
    }

    #[test]
    fn test_exchange_missing_response_code() {
        let mut stream = scripted(b"");
        let result = exchange(&mut stream, b"X");
        assert!(matches!(
            result,
            Err(CommandError::ShortReceive {
                received: 0,
                expected: 1
            })
        ));
    }

    #[test]
    fn test_exchange_truncated_failure_payload() {
        let mut stream = scripted(&[b'F', 0x01]);
        let result = exchange(&mut stream, b"X");
        assert!(matches!(
            result,
            Err(CommandError::ShortReceive {
                received: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn test_exchange_missing_query_version() {
        let mut stream = scripted(b"I");
        let result = exchange(&mut stream, b"QNTEL");
        assert!(matches!(
            result,
            Err(CommandError::ShortReceive {
                received: 0,
                expected: 1
            })
        ));
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    #[test]
    fn test_new_connection_is_unconnected() {
        let conn = EgiConnection::new();
        assert!(!conn.is_connected());
        assert!(conn.peer_addr().is_none());
        assert!(conn.protocol_version().is_none());
    }

    #[test]
    fn test_disconnect_twice_is_a_no_op() {
        let mut conn = EgiConnection::new();
        conn.disconnect();
        conn.disconnect();
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_send_while_unconnected_returns_not_connected() {
        let mut conn = EgiConnection::new();
        let result = conn.send_begin_recording();
        assert!(matches!(result, Err(CommandError::NotConnected)));
    }

    #[test]
    fn test_connect_refused_leaves_connection_unconnected() {
        // Arrange: grab a free port, then close the listener so nothing listens.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let mut conn = EgiConnection::new();

        // Act
        let result = conn.connect(Ipv4Addr::LOCALHOST, port);

        // Assert
        assert!(matches!(result, Err(ConnectError::ConnectFailed { .. })));
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_reconnect_tears_down_previous_socket() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let server = thread::spawn(move || {
            let (mut first, _) = listener.accept().expect("first accept");
            let (_second, _) = listener.accept().expect("second accept");
            // The client shut the first socket down before opening the second.
            let mut buf = [0u8; 1];
            first.read(&mut buf).expect("read")
        });
        let mut conn = EgiConnection::new();

        // Act
        conn.connect(Ipv4Addr::LOCALHOST, port).expect("first connect");
        conn.connect(Ipv4Addr::LOCALHOST, port).expect("second connect");

        // Assert
        assert_eq!(server.join().expect("server thread"), 0, "first socket must see EOF");
        assert!(conn.is_connected());
    }

    #[test]
    fn test_late_reply_is_never_paired_with_the_next_command() {
        // Arrange: the device acknowledges 'B' only after the client gave up.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let device = thread::spawn(move || {
            let (mut socket, _) = listener.accept().expect("accept");
            let mut tag = [0u8; 1];
            socket.read_exact(&mut tag).expect("tag");
            thread::sleep(Duration::from_millis(300));
            // The client may already have closed the socket.
            let _ = socket.write_all(b"Z");
            tag[0]
        });
        let mut conn = EgiConnection::with_options(TransportOptions {
            io_timeout: Some(Duration::from_millis(100)),
            connect_timeout: None,
        });
        conn.connect(Ipv4Addr::LOCALHOST, port).expect("connect");

        // Act
        let first = conn.send_begin_recording();
        let second = conn.send_end_recording();

        // Assert
        assert!(matches!(
            first,
            Err(CommandError::ShortReceive {
                received: 0,
                expected: 1
            })
        ));
        assert!(!conn.is_connected());
        assert!(matches!(second, Err(CommandError::NotConnected)));
        assert_eq!(device.join().expect("device thread"), b'B');
    }

    #[test]
    fn test_unknown_response_code_drops_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let device = thread::spawn(move || {
            let (mut socket, _) = listener.accept().expect("accept");
            let mut tag = [0u8; 1];
            socket.read_exact(&mut tag).expect("tag");
            // Unknown code followed by bytes the client must never read as a reply.
            socket.write_all(b"YZ").expect("reply");
        });
        let mut conn = EgiConnection::new();
        conn.connect(Ipv4Addr::LOCALHOST, port).expect("connect");

        let first = conn.send_attention();
        let second = conn.send_attention();

        assert!(matches!(
            first,
            Err(CommandError::Protocol(ProtocolError::UnknownResponseCode(b'Y')))
        ));
        assert!(!conn.is_connected());
        assert!(matches!(second, Err(CommandError::NotConnected)));
        device.join().expect("device thread");
    }

    #[test]
    fn test_device_rejection_keeps_the_connection_open() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let device = thread::spawn(move || {
            let (mut socket, _) = listener.accept().expect("accept");
            let mut tag = [0u8; 1];
            socket.read_exact(&mut tag).expect("first tag");
            let code = 1u16.to_ne_bytes();
            socket.write_all(&[b'F', code[0], code[1]]).expect("reject");
            socket.read_exact(&mut tag).expect("second tag");
            socket.write_all(b"Z").expect("accept");
        });
        let mut conn = EgiConnection::new();
        conn.connect(Ipv4Addr::LOCALHOST, port).expect("connect");

        let first = conn.send_end_recording();
        let second = conn.send_end_session();

        assert!(matches!(first, Err(CommandError::DeviceFailure { code: 1 })));
        assert!(second.is_ok());
        assert!(conn.is_connected());
        device.join().expect("device thread");
    }

    #[test]
    fn test_trigger_frame_on_the_wire() {
        // Arrange: a one-shot device that captures the frame and acknowledges it.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let device = thread::spawn(move || {
            let (mut socket, _) = listener.accept().expect("accept");
            let mut frame = [0u8; 28];
            socket.read_exact(&mut frame).expect("frame");
            socket.write_all(b"Z").expect("reply");
            frame
        });
        let mut conn = EgiConnection::new();
        conn.connect(Ipv4Addr::LOCALHOST, port).expect("connect");

        // Act
        conn.send_trigger(EventCode::new(*b"AB\0\0"), 100, 50)
            .expect("trigger accepted");

        // Assert
        let frame = device.join().expect("device thread");
        assert_eq!(frame[0], b'D');
        assert_eq!(u16::from_ne_bytes([frame[1], frame[2]]), 25);
        assert_eq!(&frame[3..7], &100i32.to_ne_bytes());
        assert_eq!(&frame[7..11], &50i32.to_ne_bytes());
        assert_eq!(&frame[11..15], b"AB\0\0");
        assert!(frame[15..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_transport_options_default_to_no_timeouts() {
        let options = TransportOptions::default();
        assert_eq!(options.io_timeout, None);
        assert_eq!(options.connect_timeout, None);
    }
}
