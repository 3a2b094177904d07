//! Error types for the cms50fw library.

use std::io;

use thiserror::Error;

/// Substring the platform puts in write errors once the link is gone.
const BROKEN_PIPE: &str = "Broken pipe";

/// The main error type for cms50fw operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The host has no Bluetooth radio.
    #[error("bluetooth is not supported on this host")]
    RadioUnavailable,

    /// The host radio exists but is switched off.
    #[error("bluetooth is not enabled; enable it and try again")]
    RadioDisabled,

    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation timed out.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The session has been disposed and accepts no more requests.
    #[error("session disposed")]
    Disposed,
}

/// Result type alias for cms50fw operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns true if a write failure means the link itself is gone.
///
/// Matches either the dedicated error kind or the platform message, since
/// some stacks report a dead RFCOMM socket as a generic error.
#[must_use]
pub fn is_broken_pipe(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe || err.to_string().contains(BROKEN_PIPE)
}
