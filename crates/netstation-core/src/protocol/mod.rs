//! Protocol module containing command/response types and the binary codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_command, decode_response, encode_command, encode_command_into, encode_response,
    ProtocolError,
};
pub use messages::*;
