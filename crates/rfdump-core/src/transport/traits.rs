//! Console transport layer abstraction.
//!
//! Defines the `ConsoleTransport` trait for the character-oriented link
//! to the bootloader, allowing different implementations (serialport,
//! mock, etc.).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Failed to open port {port}: {message}")]
    OpenFailed { port: String, message: String },

    #[error("Failed to enumerate serial ports: {0}")]
    EnumerationFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("No prompt after {timeout_ms}ms")]
    PromptTimeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract console transport interface.
///
/// This trait enables:
/// - Production implementation using serialport
/// - Mock implementation for unit testing
///
/// The framing contract for `execute`: a response is complete when the
/// interactive prompt marker reappears in the receive stream. The
/// returned text is everything between the echoed command and that
/// marker.
pub trait ConsoleTransport: Send {
    /// Send a command line, block until the bootloader prompt reappears,
    /// and return everything in between.
    fn execute(&mut self, command: &str) -> Result<String, TransportError>;

    /// Non-blocking read of whatever input is currently buffered.
    /// May return an empty string.
    fn read_available(&mut self) -> Result<String, TransportError>;

    /// Send a single keystroke and return the resulting buffered output.
    fn send_key(&mut self, key: char) -> Result<String, TransportError>;
}
