//! All NetStation protocol command and response types.
//!
//! Every command is a single ASCII tag byte optionally followed by a
//! fixed-layout payload.  Every response is a single ASCII code byte
//! optionally followed by a one- or two-byte payload.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::codec::ProtocolError;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Value of the length field carried by every event frame.
pub const EVENT_PAYLOAD_LEN: u16 = 25;

/// Number of reserved zero bytes that close an event frame.
pub const EVENT_PADDING_LEN: usize = 13;

/// Total size of an event frame on the wire: tag + length + 25 payload bytes.
pub const EVENT_FRAME_LEN: usize = 1 + 2 + EVENT_PAYLOAD_LEN as usize;

/// Largest frame the protocol can express: tag + u16 length + 65536 bytes.
pub const MAX_FRAME_SIZE: usize = 65536 + 3;

// ── Command tags ──────────────────────────────────────────────────────────────

/// Single-byte tag that opens every command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandTag {
    Query = b'Q',
    Exit = b'X',
    BeginRecording = b'B',
    EndRecording = b'E',
    Attention = b'A',
    TimeSynch = b'T',
    EventDataStream = b'D',
}

impl CommandTag {
    /// Number of payload bytes that follow this tag, when it is fixed.
    ///
    /// Returns `None` for [`CommandTag::EventDataStream`]: its payload length
    /// is carried in the two bytes immediately after the tag.
    pub fn payload_len_hint(self) -> Option<usize> {
        match self {
            CommandTag::Query | CommandTag::TimeSynch => Some(4),
            CommandTag::Exit
            | CommandTag::BeginRecording
            | CommandTag::EndRecording
            | CommandTag::Attention => Some(0),
            CommandTag::EventDataStream => None,
        }
    }
}

impl TryFrom<u8> for CommandTag {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'Q' => Ok(CommandTag::Query),
            b'X' => Ok(CommandTag::Exit),
            b'B' => Ok(CommandTag::BeginRecording),
            b'E' => Ok(CommandTag::EndRecording),
            b'A' => Ok(CommandTag::Attention),
            b'T' => Ok(CommandTag::TimeSynch),
            b'D' => Ok(CommandTag::EventDataStream),
            _ => Err(()),
        }
    }
}

// ── Response codes ────────────────────────────────────────────────────────────

/// Single-byte code that opens every device response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    /// Reply to a query; followed by a one-byte protocol version.
    QuerySuccess = b'I',
    /// Plain acknowledgement; no payload.
    Success = b'Z',
    /// Rejection; followed by a two-byte error code.
    Failure = b'F',
}

impl ResponseCode {
    /// Number of payload bytes the device sends after this code.
    pub fn payload_len(self) -> usize {
        match self {
            ResponseCode::QuerySuccess => 1,
            ResponseCode::Success => 0,
            ResponseCode::Failure => 2,
        }
    }
}

impl TryFrom<u8> for ResponseCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'I' => Ok(ResponseCode::QuerySuccess),
            b'Z' => Ok(ResponseCode::Success),
            b'F' => Ok(ResponseCode::Failure),
            _ => Err(()),
        }
    }
}

// ── System-identifier token ───────────────────────────────────────────────────

/// Byte order declared by a [`SystemSpec`] token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Four-byte token sent with the session-begin query.
///
/// It tells the device which byte order the controlling host writes its
/// multi-byte fields in.  The device understands `NTEL` (little-endian) and
/// treats `UNIX` and `MAC-` as synonyms for big-endian.  Any other value is
/// carried to the wire untouched.
///
/// # Examples
///
/// ```rust
/// use netstation_core::protocol::messages::{ByteOrder, SystemSpec};
///
/// assert_eq!(SystemSpec::LITTLE_ENDIAN.byte_order(), Some(ByteOrder::Little));
/// assert_eq!(SystemSpec::BIG_ENDIAN_MAC.byte_order(), Some(ByteOrder::Big));
/// assert_eq!(SystemSpec::new(*b"WXYZ").byte_order(), None);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SystemSpec([u8; 4]);

impl SystemSpec {
    /// `NTEL`: the host writes little-endian fields.
    pub const LITTLE_ENDIAN: SystemSpec = SystemSpec(*b"NTEL");
    /// `UNIX`: the host writes big-endian fields.
    pub const BIG_ENDIAN: SystemSpec = SystemSpec(*b"UNIX");
    /// `MAC-`: accepted by the device as a synonym for [`SystemSpec::BIG_ENDIAN`].
    pub const BIG_ENDIAN_MAC: SystemSpec = SystemSpec(*b"MAC-");

    /// Wraps an arbitrary four-byte token.
    pub const fn new(token: [u8; 4]) -> Self {
        Self(token)
    }

    /// Returns the token that matches the byte order of the compiling host.
    ///
    /// Frame fields are always written in native order, so this is the token
    /// a real session should announce.
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::LITTLE_ENDIAN
        } else {
            Self::BIG_ENDIAN
        }
    }

    /// The raw four bytes written to the wire.
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// The byte order this token declares, or `None` for unrecognized tokens.
    pub fn byte_order(&self) -> Option<ByteOrder> {
        match &self.0 {
            b"NTEL" => Some(ByteOrder::Little),
            b"UNIX" | b"MAC-" => Some(ByteOrder::Big),
            _ => None,
        }
    }
}

impl Default for SystemSpec {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Debug for SystemSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemSpec({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for SystemSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl TryFrom<String> for SystemSpec {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let token: [u8; 4] = value
            .as_bytes()
            .try_into()
            .map_err(|_| ProtocolError::InvalidSystemSpec(value.clone()))?;
        Ok(Self(token))
    }
}

impl From<SystemSpec> for String {
    fn from(spec: SystemSpec) -> Self {
        spec.to_string()
    }
}

// ── Event code ────────────────────────────────────────────────────────────────

/// Four-character code that labels an event marker in the recording.
///
/// The fixed-size array guarantees the encoder always has exactly four bytes
/// to copy; slices are checked when converted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventCode([u8; 4]);

impl EventCode {
    /// Wraps four raw bytes.
    pub const fn new(code: [u8; 4]) -> Self {
        Self(code)
    }

    /// Builds a code from a 1–4 character ASCII label, right-padded with spaces.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] if the label is empty,
    /// longer than four bytes, or not ASCII.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use netstation_core::protocol::messages::EventCode;
    ///
    /// let code = EventCode::from_label("stm").unwrap();
    /// assert_eq!(code.as_bytes(), b"stm ");
    /// ```
    pub fn from_label(label: &str) -> Result<Self, ProtocolError> {
        if label.is_empty() || label.len() > 4 || !label.is_ascii() {
            return Err(ProtocolError::MalformedPayload(format!(
                "event label must be 1-4 ASCII characters, got {label:?}"
            )));
        }
        let mut code = [b' '; 4];
        code[..label.len()].copy_from_slice(label.as_bytes());
        Ok(Self(code))
    }

    /// The four bytes copied into the event frame.
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl TryFrom<&[u8]> for EventCode {
    type Error = ProtocolError;

    /// Takes the first four bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::EventCodeTooShort`] when fewer than four bytes
    /// are supplied.
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        match bytes.get(..4) {
            Some(head) => {
                let mut code = [0u8; 4];
                code.copy_from_slice(head);
                Ok(Self(code))
            }
            None => Err(ProtocolError::EventCodeTooShort(bytes.len())),
        }
    }
}

impl From<[u8; 4]> for EventCode {
    fn from(code: [u8; 4]) -> Self {
        Self(code)
    }
}

impl fmt::Debug for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventCode({:?})", String::from_utf8_lossy(&self.0))
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Payload of an event-data-stream (`'D'`) command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMarker {
    /// Event code shown in the device's event track.
    pub code: EventCode,
    /// Device-clock timestamp of the event onset, in milliseconds.
    pub timestamp: i32,
    /// Event duration in milliseconds.
    pub duration_ms: i32,
}

/// Every command the controlling host can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `'Q'`: opens a session and declares the host byte order.
    BeginSession(SystemSpec),
    /// `'X'`: closes the session.
    EndSession,
    /// `'B'`: starts recording.
    BeginRecording,
    /// `'E'`: stops recording.
    EndRecording,
    /// `'A'`: takes control ahead of a synch/trigger burst.
    Attention,
    /// `'T'`: aligns the device clock with the host timestamp.
    TimeSynch(i32),
    /// `'D'`: injects an event marker.
    Event(EventMarker),
}

impl Command {
    /// Returns the tag byte this command is framed with.
    pub fn tag(&self) -> CommandTag {
        match self {
            Command::BeginSession(_) => CommandTag::Query,
            Command::EndSession => CommandTag::Exit,
            Command::BeginRecording => CommandTag::BeginRecording,
            Command::EndRecording => CommandTag::EndRecording,
            Command::Attention => CommandTag::Attention,
            Command::TimeSynch(_) => CommandTag::TimeSynch,
            Command::Event(_) => CommandTag::EventDataStream,
        }
    }

    /// Total number of bytes this command occupies on the wire.
    pub fn frame_len(&self) -> usize {
        match self {
            Command::Event(_) => EVENT_FRAME_LEN,
            // Every other tag has a fixed payload length.
            other => 1 + other.tag().payload_len_hint().unwrap_or(0),
        }
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// A fully decoded device response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// `'I'` followed by the device protocol version.
    QuerySuccess { version: u8 },
    /// `'Z'`.
    Success,
    /// `'F'` followed by the device's error code.
    Failure { error_code: u16 },
}

impl Response {
    /// Returns the code byte this response opens with.
    pub fn code(&self) -> ResponseCode {
        match self {
            Response::QuerySuccess { .. } => ResponseCode::QuerySuccess,
            Response::Success => ResponseCode::Success,
            Response::Failure { .. } => ResponseCode::Failure,
        }
    }

    /// Builds a response from its code and exactly `code.payload_len()` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InsufficientData`] if `payload` is shorter
    /// than the code requires.
    pub fn from_parts(code: ResponseCode, payload: &[u8]) -> Result<Self, ProtocolError> {
        let needed = code.payload_len();
        if payload.len() < needed {
            return Err(ProtocolError::InsufficientData {
                needed,
                available: payload.len(),
            });
        }
        Ok(match code {
            ResponseCode::QuerySuccess => Response::QuerySuccess {
                version: payload[0],
            },
            ResponseCode::Success => Response::Success,
            ResponseCode::Failure => Response::Failure {
                error_code: u16::from_ne_bytes([payload[0], payload[1]]),
            },
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
