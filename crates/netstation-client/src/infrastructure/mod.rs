//! Infrastructure layer for the NetStation client.
//!
//! Contains the adapters that touch the outside world: the blocking TCP
//! connection to the acquisition host, the configuration file, and an
//! in-process device simulator.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `netstation_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`transport`** – `send_all` / `recv_all`: keep calling the socket until a
//!   whole frame has moved or the stream gives up.
//!
//! - **`connection`** – `EgiConnection`, the blocking client.  Implements the
//!   `EventRecorder` port so use cases can drive a real device.
//!
//! - **`config`** – TOML configuration (device address, timeouts, session
//!   plan, log level).
//!
//! - **`simulator`** – a Tokio-based fake device used by the integration tests
//!   and by `netstation-demo --simulate`.

pub mod config;
pub mod connection;
pub mod simulator;
pub mod transport;
