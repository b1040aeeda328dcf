//! Dump orchestrator - drives the chunked memory scan.
//!
//! Scans a fixed span starting at the detected boot address, one
//! memory-display command per chunk, validating every block and
//! resynchronizing to the last trusted address when the console garbles
//! a response. Validation failures are steady-state conditions here,
//! not errors: the loop retries without bound and failures surface only
//! as progress events.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::events::{DumpEvent, DumpObserver, DumpPhase, TracingObserver};
use crate::session::{DumpConfig, UbootSession};
use crate::transport::ConsoleTransport;

/// Orchestrates one complete dump operation: handshake, interrogation,
/// then the chunked memory scan. Owns the session and the output stream
/// exclusively for the lifetime of the operation.
pub struct DumpRunner<T: ConsoleTransport, O: DumpObserver, W: Write> {
    session: UbootSession<T>,
    observer: Arc<O>,
    output: W,
    config: DumpConfig,
}

impl<T: ConsoleTransport, W: Write> DumpRunner<T, TracingObserver, W> {
    /// Create a runner with the default tracing observer.
    pub fn new(session: UbootSession<T>, output: W, config: DumpConfig) -> Self {
        Self::with_observer(session, output, config, Arc::new(TracingObserver))
    }
}

impl<T: ConsoleTransport, O: DumpObserver, W: Write> DumpRunner<T, O, W> {
    /// Create a runner with a custom observer.
    pub fn with_observer(
        session: UbootSession<T>,
        output: W,
        config: DumpConfig,
        observer: Arc<O>,
    ) -> Self {
        Self {
            session,
            observer,
            output,
            config,
        }
    }

    /// Hand back the session (and with it the transport) once done.
    pub fn into_session(self) -> UbootSession<T> {
        self.session
    }

    fn emit(&self, event: DumpEvent) {
        self.observer.on_event(&event);
    }

    fn change_phase(&self, from: DumpPhase, to: DumpPhase) {
        self.emit(DumpEvent::PhaseChanged { from, to });
    }

    /// Run the complete dump operation.
    #[instrument(skip(self))]
    pub fn run(&mut self) -> Result<()> {
        self.change_phase(DumpPhase::WaitingForBootloader, DumpPhase::Handshake);
        self.session
            .detect(self.config.detect_timeout())
            .context("bootloader detection failed")?;
        if let Some(ident) = self.session.ident() {
            self.emit(DumpEvent::BootloaderDetected {
                ident: ident.to_string(),
            });
        }
        self.emit(DumpEvent::AutobootInterrupted);

        self.change_phase(DumpPhase::Handshake, DumpPhase::Interrogation);
        self.session
            .initialize()
            .context("session initialization failed")?;
        self.emit(DumpEvent::BootAddressDetected {
            address: self.session.boot_address(),
        });

        self.change_phase(DumpPhase::Interrogation, DumpPhase::Dumping);
        self.scan()?;

        self.change_phase(DumpPhase::Dumping, DumpPhase::Complete);
        self.emit(DumpEvent::Complete);
        Ok(())
    }

    /// Scan `boot_address .. boot_address + span` in nominal chunks.
    fn scan(&mut self) -> Result<()> {
        let base = self.session.boot_address() as u64;
        let span = self.config.span as u64;
        let chunk_size = self.config.chunk_size as u64;
        let end = base + span;

        info!(
            base = %format!("0x{:08X}", base),
            span = span,
            chunk_size = chunk_size,
            "Starting memory scan"
        );

        let mut current = base;
        while current < end {
            // Clamp the final chunk so it never reads past the span
            let length = chunk_size.min(end - current);
            let text = self.session.read_block(current as u32, length as u32)?;
            let outcome = self.session.validate_dump_block(&text, current as u32);

            // Validated bytes are streamed out in both cases; on failure
            // that is the contiguous prefix up to the resync boundary.
            // Flushing per chunk keeps a valid image prefix on disk if
            // the process dies mid-dump.
            self.output
                .write_all(&outcome.data)
                .context("writing firmware image")?;
            self.output.flush().context("flushing firmware image")?;

            if outcome.ok {
                current += length;
            } else {
                let resync = outcome.resync_address;
                let step = chunk_size as i64 - ((current + chunk_size) as i64 - resync as i64);
                debug!(
                    address = %format!("0x{:08X}", current),
                    resync = %format!("0x{:08X}", resync),
                    step = step,
                    "Block rejected"
                );
                self.emit(DumpEvent::BlockRejected {
                    address: current as u32,
                    resync_address: resync,
                    step,
                });
                // Rewind to the last trusted boundary and retry from
                // there on the next iteration
                current += resync.wrapping_sub(current as u32) as u64;
            }

            self.emit(DumpEvent::Progress {
                phase: DumpPhase::Dumping,
                current: current - base,
                total: span,
            });
        }

        info!(bytes = end - base, "Memory scan complete");
        Ok(())
    }
}
