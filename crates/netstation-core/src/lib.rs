//! # netstation-core
//!
//! Wire types and the binary codec for the NetStation event-synchronization
//! protocol.
//!
//! This crate is shared by the client and by the in-process device simulator.
//! It has zero dependencies on OS APIs or network sockets.
//!
//! # Protocol overview (for beginners)
//!
//! A NetStation acquisition host records EEG data and listens on a TCP port
//! for a controlling application (typically a stimulus presentation program).
//! The controller tells the host when a session starts, when to record, and
//! drops *event markers* into the recording so that stimuli can later be
//! lined up with the EEG signal.
//!
//! The conversation is strictly request/response:
//!
//! ```text
//! controller                         device
//! ──────────                         ──────
//! 'Q' + "NTEL"            ──────▶
//!                         ◀──────    'I' + version
//! 'B'                     ──────▶
//!                         ◀──────    'Z'
//! 'D' + 25-byte event     ──────▶
//!                         ◀──────    'Z'   (or 'F' + error code)
//! ```
//!
//! - **`protocol::messages`** – the command tags, response codes, and the
//!   typed [`Command`] / [`Response`] values.
//! - **`protocol::codec`** – turns a [`Command`] into its fixed-layout frame
//!   and back, and does the same for responses.

pub mod protocol;

pub use protocol::codec::{
    decode_command, decode_response, encode_command, encode_command_into, encode_response,
    ProtocolError,
};
pub use protocol::messages::{
    ByteOrder, Command, CommandTag, EventCode, EventMarker, Response, ResponseCode, SystemSpec,
    MAX_FRAME_SIZE,
};
