//! netstation-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does netstation-client do? (for beginners)
//!
//! An EEG experiment usually runs on two machines: the *stimulus* computer
//! that shows pictures or plays sounds, and the *acquisition* host running
//! NetStation that records the EEG.  To line the two up afterwards, the
//! stimulus computer tells NetStation, over TCP, exactly when each stimulus
//! happened.
//!
//! This crate is the stimulus side of that conversation:
//!
//! 1. `EgiConnection` connects to the host and opens a session, announcing
//!    the byte order it will use for numbers.
//! 2. It starts the recording and, for every stimulus, sends an attention
//!    command, a time-synch point, and an event marker with a four-byte code.
//! 3. Every command waits for the host's one-byte verdict before returning,
//!    so the caller always knows whether the marker landed.
//!
//! `MarkerSessionUseCase` packages that sequence, and `DeviceSimulator`
//! stands in for the host when no lab hardware is around.

/// Application layer: the recorder port and session use case.
pub mod application;

/// Infrastructure layer: socket client, config file, device simulator.
pub mod infrastructure;
