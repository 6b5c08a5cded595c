//! The port through which the application layer talks to a recording device.
//!
//! [`EventRecorder`] mirrors the NetStation command set one-to-one.  The
//! infrastructure layer implements it on top of a TCP connection; tests
//! implement it with a mock so use cases can be checked without a socket.

use netstation_core::{EventCode, ProtocolError, SystemSpec};
use thiserror::Error;

/// Why a single command to the device did not succeed.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No connection to the device is open.
    #[error("not connected to NetStation")]
    NotConnected,
    /// The frame could not be transmitted completely; no response was awaited.
    #[error("short send: {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },
    /// The response (or its payload) did not arrive completely.
    #[error("short receive: {received} of {expected} bytes")]
    ShortReceive { received: usize, expected: usize },
    /// The device answered with an unrecognized response code.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    /// The device rejected the command with the given error code.
    #[error("device rejected command with error code {code}")]
    DeviceFailure { code: u16 },
}

impl CommandError {
    /// Returns the device's error code when the device itself refused the command.
    pub fn device_error_code(&self) -> Option<u16> {
        match self {
            CommandError::DeviceFailure { code } => Some(*code),
            _ => None,
        }
    }
}

/// Device operations needed to run a recording session.
#[cfg_attr(test, mockall::automock)]
pub trait EventRecorder {
    /// Opens a session, declaring the host byte order.
    fn begin_session(&mut self, spec: SystemSpec) -> Result<(), CommandError>;

    /// Closes the session.
    fn end_session(&mut self) -> Result<(), CommandError>;

    /// Starts recording.
    fn begin_recording(&mut self) -> Result<(), CommandError>;

    /// Stops recording.
    fn end_recording(&mut self) -> Result<(), CommandError>;

    /// Takes control ahead of a synch or trigger.
    fn attention(&mut self) -> Result<(), CommandError>;

    /// Sends a time-synchronization point.
    fn synch(&mut self, timestamp: i32) -> Result<(), CommandError>;

    /// Injects an event marker.
    fn trigger(
        &mut self,
        code: EventCode,
        timestamp: i32,
        duration_ms: i32,
    ) -> Result<(), CommandError>;
}
