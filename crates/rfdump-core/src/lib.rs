//! rfdump-core: firmware extraction over a bootloader serial console.
//!
//! This crate drives a U-Boot-family bootloader's interactive console to
//! stream out raw device memory as a flat binary image, tolerating the
//! noise of a line-buffered, human-oriented protocol with no framing
//! beyond a repeating prompt string.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: console constants and the line grammar (help table,
//!   environment lines, hexdump records)
//! - **Env**: parsed capability/environment model and the boot-address
//!   heuristics
//! - **Transport**: serial console abstraction (serialport, mock)
//! - **Handshake**: banner detection and autoboot interrupt state machine
//! - **Events**: observer pattern for UI decoupling
//! - **Session**: interrogation and the dump-block validator
//! - **Dump**: chunked scan orchestrator with resynchronization
//!
//! # Example
//!
//! ```no_run
//! use rfdump_core::dump::DumpRunner;
//! use rfdump_core::session::{DumpConfig, UbootSession};
//! use rfdump_core::transport::SerialConsole;
//!
//! let config = DumpConfig::default();
//! let console = SerialConsole::open("/dev/ttyUSB0", &config.serial).expect("open port");
//! let session = UbootSession::new(console);
//! let output = std::fs::File::create("firmware.bin").expect("create image");
//!
//! let mut runner = DumpRunner::new(session, output, config);
//! runner.run().expect("dump failed");
//! ```

pub mod dump;
pub mod env;
pub mod events;
pub mod handshake;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use dump::DumpRunner;
pub use env::{BootEnvironment, CommandTable};
pub use events::{DumpEvent, DumpObserver, DumpPhase, LogLevel, NullObserver, TracingObserver};
pub use handshake::{BootHandshake, BootloaderKind, HandshakeError, HandshakeState};
pub use protocol::DumpLine;
pub use session::{DumpConfig, SessionError, UbootSession, ValidationOutcome};
pub use transport::{
    ConsoleTransport, MockConsole, ParityMode, SerialConsole, SerialSettings, TransportError,
};
