//! Transport layer module.

pub mod mock;
pub mod serial;
pub mod traits;

pub use mock::MockConsole;
pub use serial::{ParityMode, SerialConsole, SerialSettings};
pub use traits::{ConsoleTransport, TransportError};
