//! Event system for UI decoupling.
//!
//! Allows CLI/TUI/GUI front-ends to subscribe to dump progress without
//! tight coupling to the core logic. Block validation failures surface
//! here as events, never as errors.

use std::fmt;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Phases of a dump operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpPhase {
    /// Waiting for the bootloader banner on the console.
    WaitingForBootloader,
    /// Interrupting autoboot and confirming the prompt.
    Handshake,
    /// Querying help/environment/version.
    Interrogation,
    /// Memory scan in progress.
    Dumping,
    /// Dump finished.
    Complete,
    /// Error state.
    Error,
}

impl fmt::Display for DumpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpPhase::WaitingForBootloader => write!(f, "Waiting for Bootloader"),
            DumpPhase::Handshake => write!(f, "Handshake"),
            DumpPhase::Interrogation => write!(f, "Interrogation"),
            DumpPhase::Dumping => write!(f, "Dumping"),
            DumpPhase::Complete => write!(f, "Complete"),
            DumpPhase::Error => write!(f, "Error"),
        }
    }
}

/// Events emitted during a dump operation.
#[derive(Debug, Clone)]
pub enum DumpEvent {
    /// Bootloader banner recognized on the console.
    BootloaderDetected { ident: String },
    /// Autoboot countdown interrupted, prompt available.
    AutobootInterrupted,
    /// Phase changed.
    PhaseChanged { from: DumpPhase, to: DumpPhase },
    /// Firmware base address derived from the environment.
    BootAddressDetected { address: u32 },
    /// Progress update for the memory scan, in bytes.
    Progress {
        phase: DumpPhase,
        current: u64,
        total: u64,
    },
    /// A block failed validation and the scan rewound to `resync_address`.
    /// `step` is the (possibly negative) progress delta for the attempt.
    BlockRejected {
        address: u32,
        resync_address: u32,
        step: i64,
    },
    /// Log message.
    Log { level: LogLevel, message: String },
    /// Dump completed successfully.
    Complete,
}

/// Observer trait for receiving dump events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait DumpObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &DumpEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl DumpObserver for NullObserver {
    fn on_event(&self, _event: &DumpEvent) {
        // Do nothing
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl DumpObserver for TracingObserver {
    fn on_event(&self, event: &DumpEvent) {
        match event {
            DumpEvent::BootloaderDetected { ident } => {
                tracing::info!(ident = %ident, "Bootloader detected");
            }
            DumpEvent::AutobootInterrupted => {
                tracing::info!("Autoboot interrupted, prompt available");
            }
            DumpEvent::PhaseChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Phase changed");
            }
            DumpEvent::BootAddressDetected { address } => {
                tracing::info!(address = %format!("0x{:08X}", address), "Boot address detected");
            }
            DumpEvent::Progress {
                phase,
                current,
                total,
            } => {
                let pct = if *total > 0 {
                    (*current * 100) / *total
                } else {
                    0
                };
                tracing::debug!(phase = %phase, progress = %format!("{}%", pct), current = current, "Progress");
            }
            DumpEvent::BlockRejected {
                address,
                resync_address,
                step,
            } => {
                tracing::debug!(
                    address = %format!("0x{:08X}", address),
                    resync = %format!("0x{:08X}", resync_address),
                    step = step,
                    "Block rejected, resyncing"
                );
            }
            DumpEvent::Log { level, message } => match level {
                LogLevel::Trace => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            DumpEvent::Complete => {
                tracing::info!("Dump complete");
            }
        }
    }
}
