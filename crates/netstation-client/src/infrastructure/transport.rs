//! Reliable byte transfer over a blocking stream.
//!
//! # Why loop? (for beginners)
//!
//! A TCP socket is a *stream*, not a sequence of messages.  A single
//! `write` may hand only part of a buffer to the kernel, and a single
//! `read` may return only part of what the peer sent.  A NetStation frame
//! is only meaningful when it arrives whole, so both directions keep
//! calling the primitive on the remainder until the requested byte count is
//! reached or the stream reports that it cannot continue.
//!
//! Unlike [`std::io::Write::write_all`] and [`std::io::Read::read_exact`],
//! these functions report *how far they got* instead of returning an error.
//! The connection compares that count with the expected length to decide
//! whether an exchange failed.

use std::io::{ErrorKind, Read, Write};

use tracing::debug;

/// Writes `data` to `stream` until all of it is sent or the stream fails.
///
/// Stops on `Ok(0)` (peer closed) or any error other than
/// [`ErrorKind::Interrupted`], including a socket timeout.
///
/// Returns the number of bytes actually sent.
pub fn send_all<W: Write + ?Sized>(stream: &mut W, data: &[u8]) -> usize {
    let mut sent = 0;
    while sent < data.len() {
        match stream.write(&data[sent..]) {
            Ok(0) => {
                debug!(sent, expected = data.len(), "stream accepted no more bytes");
                break;
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(sent, expected = data.len(), "send stopped: {e}");
                break;
            }
        }
    }
    sent
}

/// Reads from `stream` until `buf` is full or the stream fails.
///
/// Stops on `Ok(0)` (orderly close) or any error other than
/// [`ErrorKind::Interrupted`], including a socket timeout.
///
/// Returns the number of bytes actually received into `buf`.
pub fn recv_all<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> usize {
    let mut received = 0;
    while received < buf.len() {
        match stream.read(&mut buf[received..]) {
            Ok(0) => {
                debug!(received, expected = buf.len(), "stream closed by peer");
                break;
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(received, expected = buf.len(), "receive stopped: {e}");
                break;
            }
        }
    }
    received
}

// Scriptable stand-in for a socket, shared with the connection tests.
#[cfg(test)]
mockall::mock! {
    pub Stream {}

    impl Read for Stream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    }

    impl Write for Stream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;
        fn flush(&mut self) -> std::io::Result<()>;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
