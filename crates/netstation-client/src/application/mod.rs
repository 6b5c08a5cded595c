//! Application layer use cases for the NetStation client.
//!
//! - **`recorder`** – the [`recorder::EventRecorder`] port: the command set
//!   a use case may issue, independent of how it reaches the device.
//!
//! - **`marker_session`** – runs a complete recording session: opens the
//!   session, starts recording, drops a series of synch points and event
//!   markers at a fixed interval, then shuts everything down again.

pub mod marker_session;
pub mod recorder;
