//! Boot handshake state machine.
//!
//! Watches the console for the bootloader banner, interrupts the
//! autoboot countdown, and confirms an interactive prompt is available.
//! The machine itself has no timeout; the caller owns the overall
//! detection deadline.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::protocol::constants::{
    AUTOBOOT_PHRASE, BANNER_SIGNATURE, INTERRUPT_KEY, POLL_INTERVAL, PROMPT_MARKER,
};
use crate::protocol::grammar::clean_lines;
use crate::transport::{ConsoleTransport, TransportError};

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Bootloader not found within {timeout:?}")]
    NotFound { timeout: Duration },

    #[error("Unsupported bootloader: {0}")]
    Unsupported(String),
}

/// Bootloader families the handshake can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootloaderKind {
    UBoot,
}

impl BootloaderKind {
    /// Identify a bootloader from one banner line. Only the U-Boot
    /// family is modeled; everything else is unsupported.
    pub fn identify(line: &str) -> Option<Self> {
        if line.contains(BANNER_SIGNATURE) {
            return Some(Self::UBoot);
        }
        None
    }
}

/// Handshake progression. `Ready` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Idle,
    AwaitingBanner,
    AwaitingPrompt,
    Ready,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Idle => write!(f, "IDLE"),
            HandshakeState::AwaitingBanner => write!(f, "AWAITING_BANNER"),
            HandshakeState::AwaitingPrompt => write!(f, "AWAITING_PROMPT"),
            HandshakeState::Ready => write!(f, "READY"),
        }
    }
}

/// State machine context for one detection attempt.
#[derive(Debug, Default)]
pub struct BootHandshake {
    state: HandshakeState,
    /// Console output accumulated so far.
    buffer: String,
    /// Banner line that identified the bootloader.
    banner: Option<String>,
    kind: Option<BootloaderKind>,
    interrupt_sent: bool,
    /// Buffer offset of the interrupt echo; the prompt is only searched
    /// for from here on, so a marker split across reads is still seen.
    prompt_scan_start: usize,
}

impl BootHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Externally observable only once `Ready` is reached.
    pub fn is_ready(&self) -> bool {
        self.state == HandshakeState::Ready
    }

    /// Banner line that identified the bootloader, once seen.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn kind(&self) -> Option<BootloaderKind> {
        self.kind
    }

    fn goto_state(&mut self, new_state: HandshakeState) {
        debug!(from = %self.state, to = %new_state, "Handshake transition");
        self.state = new_state;
    }

    /// Drive the machine until `Ready`, polling the console with a
    /// cooperative wait, or fail once `deadline` has elapsed.
    pub fn run<T: ConsoleTransport>(
        &mut self,
        transport: &mut T,
        deadline: Duration,
    ) -> Result<(), HandshakeError> {
        let started = Instant::now();
        self.goto_state(HandshakeState::AwaitingBanner);

        loop {
            match self.state {
                HandshakeState::Ready => return Ok(()),
                HandshakeState::AwaitingBanner => {
                    let chunk = transport.read_available()?;
                    self.buffer.push_str(&chunk);
                    self.scan_boot_output(transport)?;
                }
                HandshakeState::AwaitingPrompt => {
                    let chunk = transport.read_available()?;
                    self.buffer.push_str(&chunk);
                    if self.buffer[self.prompt_scan_start..].contains(PROMPT_MARKER) {
                        self.goto_state(HandshakeState::Ready);
                    }
                }
                HandshakeState::Idle => unreachable!("run() starts in AwaitingBanner"),
            }

            if self.state == HandshakeState::Ready {
                return Ok(());
            }
            if started.elapsed() >= deadline {
                return Err(self.deadline_error(deadline));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Scan everything seen so far for the banner and the autoboot
    /// countdown phrase.
    fn scan_boot_output<T: ConsoleTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), HandshakeError> {
        let lines: Vec<String> = clean_lines(&self.buffer).map(str::to_string).collect();

        for line in lines {
            if self.kind.is_none()
                && let Some(kind) = BootloaderKind::identify(&line)
            {
                info!(banner = %line, "Bootloader banner detected");
                self.kind = Some(kind);
                self.banner = Some(line.clone());
            }

            if self.kind.is_some() && !self.interrupt_sent && line.starts_with(AUTOBOOT_PHRASE) {
                self.interrupt_sent = true;
                let echo = transport.send_key(INTERRUPT_KEY)?;
                self.prompt_scan_start = self.buffer.len();
                self.buffer.push_str(&echo);
                if self.buffer[self.prompt_scan_start..].contains(PROMPT_MARKER) {
                    self.goto_state(HandshakeState::Ready);
                } else {
                    self.goto_state(HandshakeState::AwaitingPrompt);
                }
                return Ok(());
            }
        }
        Ok(())
    }

    fn deadline_error(&self, timeout: Duration) -> HandshakeError {
        if self.kind.is_none()
            && let Some(first) = clean_lines(&self.buffer).find(|l| !l.trim().is_empty())
        {
            return HandshakeError::Unsupported(first.to_string());
        }
        HandshakeError::NotFound { timeout }
    }
}
