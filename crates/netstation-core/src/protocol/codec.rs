//! Binary codec for NetStation command frames and device responses.
//!
//! Command frames:
//! ```text
//! Q  [tag:1][system_spec:4]
//! X  [tag:1]
//! B  [tag:1]
//! E  [tag:1]
//! A  [tag:1]
//! T  [tag:1][timestamp:4]
//! D  [tag:1][len:2 = 25][timestamp:4][duration_ms:4][code:4][reserved:13]
//! ```
//!
//! Responses:
//! ```text
//! I  [code:1][version:1]
//! Z  [code:1]
//! F  [code:1][error_code:2]
//! ```
//!
//! Multi-byte integers are written in the host's native byte order.  The
//! device learns that order from the system-spec token of the `Q` frame.

use thiserror::Error;
use tracing::trace;

use crate::protocol::messages::{
    Command, CommandTag, EventCode, EventMarker, Response, ResponseCode, SystemSpec,
    EVENT_FRAME_LEN, EVENT_PADDING_LEN, EVENT_PAYLOAD_LEN,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the frame requires.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The first byte of a command frame is not a known tag.
    #[error("unknown command tag: 0x{0:02X}")]
    UnknownCommandTag(u8),

    /// The first byte of a response is not a known response code.
    #[error("unknown response code: 0x{0:02X}")]
    UnknownResponseCode(u8),

    /// A field value is out of range (e.g. wrong event length field).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// An event code was built from fewer than four bytes.
    #[error("event code needs 4 bytes, got {0}")]
    EventCodeTooShort(usize),

    /// A system-spec token was not exactly four bytes.
    #[error("system spec must be exactly 4 bytes, got {0:?}")]
    InvalidSystemSpec(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Writes the frame for `command` into `buf`, replacing its previous contents.
///
/// The frame is assembled completely before this function returns, so a
/// caller that transmits `buf` afterwards never sends a partial frame.
/// `buf` keeps its allocation across calls.
///
/// # Examples
///
/// ```rust
/// use netstation_core::protocol::codec::encode_command_into;
/// use netstation_core::protocol::messages::Command;
///
/// let mut buf = Vec::new();
/// encode_command_into(&Command::TimeSynch(7), &mut buf);
/// assert_eq!(buf[0], b'T');
/// assert_eq!(&buf[1..], &7i32.to_ne_bytes());
/// ```
pub fn encode_command_into(command: &Command, buf: &mut Vec<u8>) {
    buf.clear();
    buf.push(command.tag() as u8);
    match command {
        Command::BeginSession(spec) => buf.extend_from_slice(spec.as_bytes()),
        Command::EndSession
        | Command::BeginRecording
        | Command::EndRecording
        | Command::Attention => {}
        Command::TimeSynch(timestamp) => buf.extend_from_slice(&timestamp.to_ne_bytes()),
        Command::Event(marker) => encode_event(buf, marker),
    }
}

/// Encodes `command` into a freshly allocated frame.
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut buf = Vec::with_capacity(command.frame_len());
    encode_command_into(command, &mut buf);
    buf
}

/// Decodes one [`Command`] from the beginning of `bytes`.
///
/// Returns the command and the number of bytes consumed so the caller can
/// advance its read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the frame is truncated, the tag is unknown,
/// or an event frame declares a length other than 25.
///
/// # Examples
///
/// ```rust
/// use netstation_core::protocol::codec::{decode_command, encode_command};
/// use netstation_core::protocol::messages::Command;
///
/// let bytes = encode_command(&Command::BeginRecording);
/// let (decoded, n) = decode_command(&bytes).unwrap();
/// assert_eq!(decoded, Command::BeginRecording);
/// assert_eq!(n, 1);
/// ```
pub fn decode_command(bytes: &[u8]) -> Result<(Command, usize), ProtocolError> {
    let tag_byte = *bytes.first().ok_or(ProtocolError::InsufficientData {
        needed: 1,
        available: 0,
    })?;
    let tag =
        CommandTag::try_from(tag_byte).map_err(|_| ProtocolError::UnknownCommandTag(tag_byte))?;
    let payload = &bytes[1..];

    let command = match tag {
        CommandTag::Query => {
            require_len(bytes, 5)?;
            Command::BeginSession(SystemSpec::new([
                payload[0], payload[1], payload[2], payload[3],
            ]))
        }
        CommandTag::Exit => Command::EndSession,
        CommandTag::BeginRecording => Command::BeginRecording,
        CommandTag::EndRecording => Command::EndRecording,
        CommandTag::Attention => Command::Attention,
        CommandTag::TimeSynch => {
            require_len(bytes, 5)?;
            Command::TimeSynch(read_i32(payload, 0))
        }
        CommandTag::EventDataStream => Command::Event(decode_event(bytes)?),
    };
    Ok((command, command.frame_len()))
}

/// Encodes a device response.  Used by the device simulator and tests.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + response.code().payload_len());
    buf.push(response.code() as u8);
    match response {
        Response::QuerySuccess { version } => buf.push(*version),
        Response::Success => {}
        Response::Failure { error_code } => buf.extend_from_slice(&error_code.to_ne_bytes()),
    }
    buf
}

/// Decodes one [`Response`] from the beginning of `bytes`.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownResponseCode`] for an unrecognized first
/// byte and [`ProtocolError::InsufficientData`] if the trailing payload is
/// incomplete.
pub fn decode_response(bytes: &[u8]) -> Result<(Response, usize), ProtocolError> {
    let code_byte = *bytes.first().ok_or(ProtocolError::InsufficientData {
        needed: 1,
        available: 0,
    })?;
    let code = ResponseCode::try_from(code_byte)
        .map_err(|_| ProtocolError::UnknownResponseCode(code_byte))?;
    let response = Response::from_parts(code, &bytes[1..])?;
    Ok((response, 1 + code.payload_len()))
}

// ── Event frame helpers ───────────────────────────────────────────────────────

fn encode_event(buf: &mut Vec<u8>, marker: &EventMarker) {
    buf.extend_from_slice(&EVENT_PAYLOAD_LEN.to_ne_bytes());
    buf.extend_from_slice(&marker.timestamp.to_ne_bytes());
    buf.extend_from_slice(&marker.duration_ms.to_ne_bytes());
    buf.extend_from_slice(marker.code.as_bytes());
    buf.extend_from_slice(&[0u8; EVENT_PADDING_LEN]);
}

fn decode_event(frame: &[u8]) -> Result<EventMarker, ProtocolError> {
    require_len(frame, 3)?;
    let declared = u16::from_ne_bytes([frame[1], frame[2]]);
    if declared != EVENT_PAYLOAD_LEN {
        return Err(ProtocolError::MalformedPayload(format!(
            "event length field is {declared}, expected {EVENT_PAYLOAD_LEN}"
        )));
    }
    require_len(frame, EVENT_FRAME_LEN)?;

    // frame[3..] = timestamp(4) duration(4) code(4) reserved(13)
    let body = &frame[3..EVENT_FRAME_LEN];
    let code = EventCode::try_from(&body[8..12])?;
    if body[12..].iter().any(|&b| b != 0) {
        trace!("event frame carries non-zero reserved bytes; ignoring them");
    }
    Ok(EventMarker {
        code,
        timestamp: read_i32(body, 0),
        duration_ms: read_i32(body, 4),
    })
}

// ── Primitive helpers ─────────────────────────────────────────────────────────

fn require_len(bytes: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if bytes.len() < needed {
        return Err(ProtocolError::InsufficientData {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

/// Reads a native-order i32 at `offset`.  Callers check the length first.
fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_ne_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
